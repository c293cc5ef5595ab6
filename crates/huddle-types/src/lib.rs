pub mod envelope;
pub mod error;
pub mod models;

pub use error::{Error, Result};
