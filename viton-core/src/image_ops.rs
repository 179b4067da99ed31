//! Conversions between uploaded bytes, model tensors and encoded PNGs.

use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine};
use candle_core::{DType, Device, IndexOp, Tensor};
use image::{imageops::FilterType, DynamicImage, ImageReader};

use crate::{Error, Result};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Input size the generator runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// Decodes an uploaded image into a `(1, 3, height, width)` tensor on `device`,
/// ImageNet-normalized.
pub fn preprocess_image(bytes: &[u8], resolution: Resolution, device: &Device) -> Result<Tensor> {
    if resolution.width == 0 || resolution.height == 0 {
        return Err(Error::InvalidTensor(format!(
            "resize target must be non-empty, got {}x{}",
            resolution.width, resolution.height
        )));
    }
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::Decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(Error::Decode)?;
    let Resolution { width, height } = resolution;
    let img = img
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgb8();

    let data = Tensor::from_vec(
        img.into_raw(),
        (height as usize, width as usize, 3),
        &Device::Cpu,
    )?
    .permute((2, 0, 1))?;
    let mean = Tensor::new(&IMAGENET_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, &Device::Cpu)?.reshape((3, 1, 1))?;
    let normalized = (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?;
    Ok(normalized.unsqueeze(0)?.to_device(device)?)
}

/// Maps a `(1, 3, H, W)` generator output in `[-1, 1]` back to an RGB image.
pub fn postprocess(output: &Tensor) -> Result<DynamicImage> {
    let (batch, channels, _, _) = output.dims4()?;
    if batch != 1 || channels != 3 {
        return Err(Error::InvalidTensor(format!(
            "expected generator output of shape (1, 3, H, W), got {:?}",
            output.dims()
        )));
    }
    let img = output
        .i(0)?
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .affine(127.5, 127.5)?
        .clamp(0f32, 255f32)?
        .to_dtype(DType::U8)?;
    tensor_to_image(&img)
}

/// Converts a `u8` tensor with shape (3, height, width) into an RGB image.
pub fn tensor_to_image(img: &Tensor) -> Result<DynamicImage> {
    let (channels, height, width) = img.dims3()?;
    if channels != 3 {
        return Err(Error::InvalidTensor(
            "tensor_to_image expects an image with 3 channels".to_string(),
        ));
    }
    let img = img.permute((1, 2, 0))?.flatten_all()?;
    let pixels = img.to_vec1::<u8>()?;
    let buffer = image::ImageBuffer::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| Error::InvalidTensor("error converting tensor to image buffer".into()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

pub fn encode_png_base64(img: &DynamicImage) -> Result<String> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(Error::Encode)?;
    Ok(BASE64_STANDARD.encode(&bytes))
}

pub fn png_data_url(img: &DynamicImage) -> Result<String> {
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", encode_png_base64(img)?))
}
