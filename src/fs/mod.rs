pub mod error;
pub mod path;

pub use error::{FsError, FsResult};
pub use path::normalize_path;
