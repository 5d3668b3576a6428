pub mod cache;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod io;
pub mod manifest;
pub mod matrix;
pub mod merge;
pub mod paths;
pub mod pool;
pub mod report;
pub mod shell;
pub mod types;

pub use error::{CirunError, ParseError, Result};
