//! Error type shared by the try-on pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The selected checkpoint does not exist on disk.
    #[error("Model checkpoint not found at {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    /// The checkpoint extension is not one we know how to read.
    #[error("unsupported checkpoint format: {}", path.display())]
    UnsupportedCheckpoint { path: PathBuf },

    /// An uploaded image could not be decoded.
    #[error("Error preprocessing image: {0}")]
    Decode(#[source] image::ImageError),

    /// The generated image could not be encoded.
    #[error("failed to encode result image: {0}")]
    Encode(#[source] image::ImageError),

    /// A tensor had an unexpected shape or could not be turned into an image.
    #[error("invalid tensor: {0}")]
    InvalidTensor(String),

    /// The generator configuration file could not be parsed.
    #[error("invalid generator config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
