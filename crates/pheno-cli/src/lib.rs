//! Library side of the `pheno` binary: logging setup and CSV output.

pub mod logging;
pub mod output;
