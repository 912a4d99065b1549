pub mod config;
pub mod error;
pub mod types;

pub use error::{BlockdiffError, BlockdiffResult, MapField};
pub use types::{HashAlgorithm, SinkMode};
