//! Frame type and pixel conversion helpers.

use image::RgbImage;
use thiserror::Error;

/// One captured RGB frame.
#[derive(Clone)]
pub struct VideoFrame {
    pub image: RgbImage,
    pub sequence: u64,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image decode failed: {0}")]
    Decode(String),
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], with U/V shared
/// by the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: yuyv.len() });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        push_yuv_pixel(&mut rgb, y0, u, v);
        push_yuv_pixel(&mut rgb, y1, u, v);
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or(FrameError::InvalidLength { expected, actual: 0 })
}

fn push_yuv_pixel(rgb: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    rgb.push(clamp_u8(y + 1.402 * v));
    rgb.push(clamp_u8(y - 0.344 * u - 0.714 * v));
    rgb.push(clamp_u8(y + 1.772 * u));
}

/// Expand 8-bit grayscale into RGB by channel replication.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height) as usize;
    if grey.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: grey.len() });
    }
    let mut rgb = Vec::with_capacity(expected * 3);
    for &p in &grey[..expected] {
        rgb.extend_from_slice(&[p, p, p]);
    }
    RgbImage::from_raw(width, height, rgb)
        .ok_or(FrameError::InvalidLength { expected, actual: 0 })
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Downscale a frame for detection (0.25 in the default pipeline).
pub fn downscale(image: &RgbImage, factor: f32) -> RgbImage {
    let w = ((image.width() as f32 * factor).round() as u32).max(1);
    let h = ((image.height() as f32 * factor).round() as u32).max(1);
    image::imageops::resize(image, w, h, image::imageops::FilterType::Triangle)
}
