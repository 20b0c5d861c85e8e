pub mod error;

pub use error::{Error, ErrorKind, LookupError, Result};
