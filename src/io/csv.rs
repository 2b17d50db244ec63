/*!
# Saving and Loading Chains as CSV

Chains are stored in long format: a header row `chain,sample,<names...>`
followed by one row per draw. Enable via the `csv` feature.
*/

use ndarray::Array2;
use std::fs::File;
use std::path::Path;

use csv::{Reader, Writer};

use crate::error::{invalid, Result};

/**
Saves `chains` as a CSV file.

The resulting CSV file will have:
- A header row containing `"chain"`, `"sample"`, and one column per parameter,
  named after `names` or `"param 1"`, `"param 2"`, ... if `names` is `None`.
- One row per draw, with chain and draw index followed by the values.

# Errors
[`Error::InvalidArgument`](crate::error::Error::InvalidArgument) if the chains
disagree on the number of parameters or `names` has the wrong length, and
I/O or CSV errors from writing the file.

# Examples

```rust
use mcmc_diagnostics::io::csv::{load_chains_csv, save_chains_csv};
use ndarray::array;

let chains = vec![array![[1.0, 2.0], [3.0, 4.0]], array![[5.0, 6.0], [7.0, 8.0]]];
let file = std::env::temp_dir().join("mcmc_diagnostics_doc.csv");
save_chains_csv(&chains, None, &file)?;

let (loaded, names) = load_chains_csv(&file)?;
assert_eq!(loaded, chains);
assert_eq!(names, ["param 1", "param 2"]);
# Ok::<(), mcmc_diagnostics::Error>(())
```
*/
pub fn save_chains_csv<P: AsRef<Path>>(
    chains: &[Array2<f64>],
    names: Option<&[String]>,
    path: P,
) -> Result<()> {
    let n_parameters = chains.first().map_or(0, |c| c.ncols());
    if chains.iter().any(|c| c.ncols() != n_parameters) {
        return invalid("all chains must have the same number of parameters");
    }
    let names: Vec<String> = match names {
        Some(names) if names.len() != n_parameters => {
            return invalid(format!(
                "got {} names for {} parameters",
                names.len(),
                n_parameters
            ));
        }
        Some(names) => names.to_vec(),
        None => (1..=n_parameters).map(|i| format!("param {i}")).collect(),
    };

    let mut wtr = Writer::from_writer(File::create(path)?);

    let mut header: Vec<String> = vec!["chain".to_string(), "sample".to_string()];
    header.extend(names);
    wtr.write_record(&header)?;

    for (chain_idx, chain) in chains.iter().enumerate() {
        for (sample_idx, draw) in chain.rows().into_iter().enumerate() {
            let mut row = vec![chain_idx.to_string(), sample_idx.to_string()];
            row.extend(draw.iter().map(|v| v.to_string()));
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    log::debug!("Saved {} chains with {} parameters", chains.len(), n_parameters);
    Ok(())
}

/**
Loads chains written by [`save_chains_csv`].

Returns the chains in order of their chain index, together with the parameter
names from the header. Rows must be grouped by chain; the `sample` column is
not interpreted.
*/
pub fn load_chains_csv<P: AsRef<Path>>(path: P) -> Result<(Vec<Array2<f64>>, Vec<String>)> {
    let mut rdr = Reader::from_reader(File::open(path)?);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 || &headers[0] != "chain" || &headers[1] != "sample" {
        return invalid("CSV header must start with \"chain,sample\"");
    }
    let names: Vec<String> = headers.iter().skip(2).map(String::from).collect();
    let n_parameters = names.len();

    let mut chains: Vec<Array2<f64>> = Vec::new();
    let mut current: Option<usize> = None;
    let mut values: Vec<f64> = Vec::new();

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let chain_idx: usize = record[0]
            .parse()
            .map_err(|_| parse_error(line, "chain", &record[0]))?;
        if current != Some(chain_idx) {
            if let Some(prev) = current {
                if chain_idx != prev + 1 {
                    return invalid(format!(
                        "row {line}: chain {chain_idx} follows chain {prev}"
                    ));
                }
                chains.push(to_chain(std::mem::take(&mut values), n_parameters)?);
            } else if chain_idx != 0 {
                return invalid(format!("row {line}: first chain must have index 0"));
            }
            current = Some(chain_idx);
        }
        for field in record.iter().skip(2) {
            let v: f64 = field
                .parse()
                .map_err(|_| parse_error(line, "value", field))?;
            values.push(v);
        }
    }
    if current.is_some() {
        chains.push(to_chain(values, n_parameters)?);
    }

    Ok((chains, names))
}

fn parse_error(line: usize, what: &str, field: &str) -> crate::error::Error {
    crate::error::Error::InvalidArgument(format!("row {line}: cannot parse {what} {field:?}"))
}

fn to_chain(values: Vec<f64>, n_parameters: usize) -> Result<Array2<f64>> {
    let n_draws = if n_parameters == 0 { 0 } else { values.len() / n_parameters };
    Array2::from_shape_vec((n_draws, n_parameters), values)
        .or_else(|e| invalid(format!("ragged chain: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_save_chains_csv_layout() {
        let chains = vec![array![[1.0, 2.0], [3.0, 4.0]], array![[10.0, 20.0], [30.0, 40.0]]];
        let file = NamedTempFile::new().expect("Could not create temp file");

        save_chains_csv(&chains, None, file.path()).unwrap();

        let contents = fs::read_to_string(file.path()).unwrap();
        let expected = "\
chain,sample,param 1,param 2
0,0,1,2
0,1,3,4
1,0,10,20
1,1,30,40";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_round_trip_with_names() {
        let chains = vec![
            array![[0.125, -1.5], [2.75, 1e-3], [3.0, 4.0]],
            array![[5.5, 6.0], [7.25, -8.0], [f64::MAX, f64::MIN_POSITIVE]],
        ];
        let names = vec!["mu".to_string(), "log sigma".to_string()];
        let file = NamedTempFile::new().expect("Could not create temp file");

        save_chains_csv(&chains, Some(&names), file.path()).unwrap();
        let (loaded, loaded_names) = load_chains_csv(file.path()).unwrap();

        assert_eq!(loaded, chains);
        assert_eq!(loaded_names, names);
    }

    #[test]
    fn test_save_rejects_bad_input() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        let mixed = vec![Array2::<f64>::zeros((2, 2)), Array2::<f64>::zeros((2, 3))];
        assert!(matches!(
            save_chains_csv(&mixed, None, file.path()),
            Err(Error::InvalidArgument(_))
        ));

        let chains = vec![Array2::<f64>::zeros((2, 2))];
        let names = vec!["only one".to_string()];
        assert!(matches!(
            save_chains_csv(&chains, Some(&names), file.path()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_rejects_malformed_files() {
        let file = NamedTempFile::new().expect("Could not create temp file");

        fs::write(file.path(), "a,b,c\n0,0,1\n").unwrap();
        assert!(matches!(load_chains_csv(file.path()), Err(Error::InvalidArgument(_))));

        fs::write(file.path(), "chain,sample,x\n0,0,abc\n").unwrap();
        assert!(matches!(load_chains_csv(file.path()), Err(Error::InvalidArgument(_))));

        fs::write(file.path(), "chain,sample,x\n0,0,1\n2,0,1\n").unwrap();
        assert!(matches!(load_chains_csv(file.path()), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert!(matches!(load_chains_csv(missing), Err(Error::Io(_))));
    }
}
