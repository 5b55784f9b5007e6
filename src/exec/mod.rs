//! Query assembly and execution.

mod assembly;
mod executor;

pub use assembly::{QueryAssembler, TableQuery, DEFAULT_ALIAS};
pub use executor::{QueryExecutor, SqliteExecutor};
