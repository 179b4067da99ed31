use image::DynamicImage;

use crate::image_ops::{png_data_url, postprocess, preprocess_image, Resolution};
use crate::{Result, TryOnModel};

pub struct TryOnOutput {
    pub image: DynamicImage,
    /// `data:image/png;base64,...`
    pub data_url: String,
}

/// Runs one try-on request end to end: decode both uploads, a single forward
/// pass, then encode the result.
pub fn try_on(
    model: &dyn TryOnModel,
    person: &[u8],
    clothing: &[u8],
    resolution: Resolution,
) -> Result<TryOnOutput> {
    let device = model.device();
    let person = preprocess_image(person, resolution, device)?;
    let clothing = preprocess_image(clothing, resolution, device)?;
    tracing::debug!(person = ?person.dims(), clothing = ?clothing.dims(), "preprocessed inputs");

    let output = model.run(&person, &clothing)?;
    tracing::debug!(output = ?output.dims(), "generator output");

    let image = postprocess(&output)?;
    let data_url = png_data_url(&image)?;
    Ok(TryOnOutput { image, data_url })
}
