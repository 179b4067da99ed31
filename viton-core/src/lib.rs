//! Core of the try-on service: device selection, checkpoint handling, the
//! generator network and the image pre/postprocessing around it.

#[cfg(feature = "accelerate")]
extern crate accelerate_src;
#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

pub mod checkpoint;
pub mod device;
pub mod error;
pub mod generator;
pub mod image_ops;
pub mod pipeline;

pub use checkpoint::*;
pub use device::*;
pub use error::{Error, Result};
pub use generator::*;
pub use image_ops::Resolution;
pub use pipeline::{try_on, TryOnOutput};
