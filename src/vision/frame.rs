//! Frame sources and frame preparation

use crate::config::CameraConfig;
use crate::error::{DishaError, Result};
use image::RgbImage;
use image::imageops;

/// Blur applied before colour thresholding
const BLUR_SIGMA: f32 = 2.0;

/// Overhead camera delivering RGB frames
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<RgbImage>;
}

/// Crop a full frame to the region of interest and smooth it
pub fn prepare(frame: &RgbImage, roi: &CameraConfig) -> Result<RgbImage> {
    if roi.offx + roi.width > frame.width() || roi.offy + roi.height > frame.height() {
        return Err(DishaError::FrameGrab(format!(
            "frame {}x{} does not contain ROI {}x{}+{}+{}",
            frame.width(),
            frame.height(),
            roi.width,
            roi.height,
            roi.offx,
            roi.offy
        )));
    }
    let cropped = imageops::crop_imm(frame, roi.offx, roi.offy, roi.width, roi.height).to_image();
    Ok(imageops::blur(&cropped, BLUR_SIGMA))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_crops_to_roi() {
        let frame = RgbImage::new(100, 80);
        let roi = CameraConfig {
            offx: 10,
            offy: 5,
            width: 60,
            height: 40,
        };
        let prepared = prepare(&frame, &roi).unwrap();
        assert_eq!(prepared.dimensions(), (60, 40));
    }

    #[test]
    fn test_prepare_rejects_small_frame() {
        let frame = RgbImage::new(50, 50);
        let err = prepare(&frame, &CameraConfig::default()).unwrap_err();
        assert!(matches!(err, DishaError::FrameGrab(_)));
    }
}
