pub mod types;
pub mod codec;
pub mod orientation;
pub mod deidentify;
pub mod reduce;
pub mod processor;

pub use types::*;
pub use codec::*;
pub use orientation::*;
pub use deidentify::*;
pub use reduce::*;
pub use processor::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size_bytes} bytes exceeds {max_bytes} byte limit")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Failed to encode image: {0}")]
    ImageEncode(String),

    #[error("Image worker failed: {0}")]
    Worker(String),
}
