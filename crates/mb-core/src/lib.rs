pub mod error;
pub mod keys;
pub mod types;

pub use error::{ErrorKind, MboxError};
pub use keys::*;
pub use types::*;
