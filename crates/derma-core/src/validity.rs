//! Upload validity gate.
//!
//! Uploads must decode, meet a minimum pixel size, and — when a face
//! screen is loaded — contain at least one sufficiently large face.
//! The gate is the only part of the pipeline that looks at pixels.

use crate::screen::{FaceBox, FaceScreen, ScreenError};
use image::RgbImage;
use thiserror::Error;

pub const DEFAULT_MIN_DIMENSION: u32 = 256;
/// Minimum fraction of the frame a face box must cover.
pub const DEFAULT_MIN_FACE_AREA: f32 = 0.02;

#[derive(Error, Debug)]
pub enum ValidityError {
    #[error("image could not be decoded: {0}")]
    Undecodable(#[from] image::ImageError),
    #[error("image too small: {width}x{height} (minimum {min}px per side)")]
    TooSmall { width: u32, height: u32, min: u32 },
    #[error("no usable face found in the image — use a clear, front-facing photo")]
    NoFace,
    #[error("face screen failed: {0}")]
    Screen(#[from] ScreenError),
}

/// Decode uploaded bytes into an RGB image.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ValidityError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Reject images under the minimum dimension on either side.
pub fn check_dimensions(image: &RgbImage, min: u32) -> Result<(), ValidityError> {
    let (width, height) = image.dimensions();
    if width < min || height < min {
        return Err(ValidityError::TooSmall { width, height, min });
    }
    Ok(())
}

/// Run the face screen and require one face covering at least
/// `min_area_frac` of the frame. Returns the accepted face.
pub fn check_face(
    screen: &mut FaceScreen,
    image: &RgbImage,
    min_area_frac: f32,
) -> Result<FaceBox, ValidityError> {
    let (width, height) = image.dimensions();
    let frame_area = (width as f32) * (height as f32);

    let faces = screen.detect(image)?;
    faces
        .into_iter()
        .find(|face| face.area() >= min_area_frac * frame_area)
        .ok_or(ValidityError::NoFace)
}
