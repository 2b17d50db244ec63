/*!
Persistence of sampled chains. Enable via the `csv` feature.
*/

#[cfg(feature = "csv")]
pub mod csv;
