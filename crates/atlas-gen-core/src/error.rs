use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasGenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid atlas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error(
        "'{key}' ({width}x{height}) is larger than the atlas ({atlas_width}x{atlas_height})"
    )]
    OversizedImage {
        key: String,
        width: u32,
        height: u32,
        atlas_width: u32,
        atlas_height: u32,
    },
    #[error("Duplicate image name: {0}")]
    DuplicateKey(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Encoding error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, AtlasGenError>;
