//! Frame sequence helpers shared by the motion strategies.

use image::imageops::{self, FilterType};
use image::RgbImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use reelforge_models::CanonicalTarget;

use crate::error::{MediaError, MediaResult};

/// printf-style pattern FFmpeg reads the sequence with.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

/// Path of frame `index` (0-based) inside `dir`.
pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:05}.png", index))
}

/// Frames needed to cover `duration` seconds at `fps`.
pub fn frame_count(duration: f64, fps: u32) -> usize {
    ((duration * fps as f64) - 1e-6).ceil().max(1.0) as usize
}

/// Normalized position of frame `index` among `count` frames.
pub fn progress(index: usize, count: usize) -> f64 {
    if count <= 1 {
        0.0
    } else {
        index as f64 / (count - 1) as f64
    }
}

/// Cosine ease-in-out, 0 at t = 0 and 1 at t = 1.
pub fn ease_in_out(t: f64) -> f64 {
    0.5 * (1.0 - (std::f64::consts::PI * t.clamp(0.0, 1.0)).cos())
}

/// Largest `aspect` (width / height) box that fits in `width x height`,
/// unrounded.
pub fn cover_box(width: u32, height: u32, aspect: f64) -> (f64, f64) {
    let (w, h) = (width as f64, height as f64);
    if w / h > aspect {
        (h * aspect, h)
    } else {
        (w, w / aspect)
    }
}

/// Center-crop to the target aspect and resize to the target size.
pub fn fit_to_target(image: &RgbImage, target: &CanonicalTarget) -> RgbImage {
    let (bw, bh) = cover_box(image.width(), image.height(), target.aspect_ratio());
    let x = ((image.width() as f64 - bw) / 2.0).round() as u32;
    let y = ((image.height() as f64 - bh) / 2.0).round() as u32;
    let w = (bw.round() as u32).clamp(1, image.width() - x);
    let h = (bh.round() as u32).clamp(1, image.height() - y);

    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    imageops::resize(&cropped, target.width, target.height, FilterType::Lanczos3)
}

/// Decode a still as RGB.
pub fn load_rgb(path: &Path) -> MediaResult<RgbImage> {
    let image = image::open(path)
        .map_err(|e| MediaError::motion_failed(format!("cannot decode {}: {}", path.display(), e)))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::motion_failed(format!("{} is empty", path.display())));
    }
    Ok(image.to_rgb8())
}

/// Render `count` frames in parallel and write them as a PNG sequence.
pub fn render_sequence<F>(dir: &Path, count: usize, render: F) -> MediaResult<()>
where
    F: Fn(usize) -> RgbImage + Sync + Send,
{
    std::fs::create_dir_all(dir)?;
    (0..count).into_par_iter().try_for_each(|i| {
        render(i)
            .save(frame_path(dir, i))
            .map_err(MediaError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(2.0, 30), 60);
        assert_eq!(frame_count(2.01, 30), 61);
        assert_eq!(frame_count(0.0, 30), 1);
    }

    #[test]
    fn test_progress_single_frame_is_zero() {
        assert_eq!(progress(0, 1), 0.0);
        assert_eq!(progress(9, 10), 1.0);
    }

    #[test]
    fn test_easing_endpoints_and_midpoint() {
        assert!(ease_in_out(0.0).abs() < 1e-12);
        assert!((ease_in_out(1.0) - 1.0).abs() < 1e-12);
        assert!((ease_in_out(0.5) - 0.5).abs() < 1e-12);
        // Slow start
        assert!(ease_in_out(0.1) < 0.1);
    }

    #[test]
    fn test_cover_box() {
        let (w, h) = cover_box(4000, 3000, 16.0 / 9.0);
        assert!((w - 4000.0).abs() < 1e-9);
        assert!((h - 2250.0).abs() < 1e-9);

        let (w, h) = cover_box(1000, 2000, 16.0 / 9.0);
        assert!((w - 1000.0).abs() < 1e-9);
        assert!((h - 562.5).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_target() {
        let img = RgbImage::from_pixel(300, 400, image::Rgb([10, 20, 30]));
        let fitted = fit_to_target(&img, &CanonicalTarget::new(160, 90, 30));
        assert_eq!(fitted.dimensions(), (160, 90));
    }

    #[test]
    fn test_render_sequence_writes_numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        render_sequence(dir.path(), 3, |i| {
            RgbImage::from_pixel(8, 8, image::Rgb([i as u8 * 50, 0, 0]))
        })
        .unwrap();

        for i in 0..3 {
            assert!(frame_path(dir.path(), i).exists());
        }
        assert!(!frame_path(dir.path(), 3).exists());
    }
}
