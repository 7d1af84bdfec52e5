//! Parametric Ken Burns motion.
//!
//! Zoom and pan are interpolated with a cosine ease between randomly drawn
//! endpoints. Crop geometry stays in floating point until the final crop so
//! neighbouring frames never jitter by more than a rounding step.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::debug;

use reelforge_models::{CanonicalTarget, EncodingConfig};

use super::frames::{cover_box, ease_in_out, frame_count, load_rgb, progress, render_sequence};
use super::{encode_frames, MotionRequest, MotionStrategy};
use crate::error::{MediaError, MediaResult};
use crate::job::MediaJobRunner;
use crate::workdir::WorkDir;

/// Zoom at the wide end of the move.
pub const ZOOM_MIN: f64 = 1.0;
/// Zoom at the tight end of the move.
pub const ZOOM_MAX: f64 = 1.15;
/// End pan offset bound, as a fraction of the frame.
pub const PAN_RANGE: f64 = 0.05;

/// Endpoints of one camera move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KenBurnsParams {
    pub zoom_start: f64,
    pub zoom_end: f64,
    pub pan_start: (f64, f64),
    pub pan_end: (f64, f64),
    /// Degrees
    pub rotation_start: f64,
    pub rotation_end: f64,
}

/// Camera state at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub rotation: f64,
}

impl KenBurnsParams {
    /// Draw a move: zoom in or out with equal odds, pan from center to a
    /// random offset within the pan range, no rotation.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (zoom_start, zoom_end) = if rng.random_bool(0.5) {
            (ZOOM_MAX, ZOOM_MIN)
        } else {
            (ZOOM_MIN, ZOOM_MAX)
        };
        Self {
            zoom_start,
            zoom_end,
            pan_start: (0.0, 0.0),
            pan_end: (
                rng.random_range(-PAN_RANGE..=PAN_RANGE),
                rng.random_range(-PAN_RANGE..=PAN_RANGE),
            ),
            rotation_start: 0.0,
            rotation_end: 0.0,
        }
    }

    /// Camera state at linear progress `t` in [0, 1].
    pub fn at(&self, t: f64) -> FrameParams {
        let p = ease_in_out(t);
        let lerp = |a: f64, b: f64| a + (b - a) * p;
        FrameParams {
            zoom: lerp(self.zoom_start, self.zoom_end),
            pan_x: lerp(self.pan_start.0, self.pan_end.0),
            pan_y: lerp(self.pan_start.1, self.pan_end.1),
            rotation: lerp(self.rotation_start, self.rotation_end),
        }
    }
}

/// Integer crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Unrounded crop rectangle as (left, top, width, height).
pub fn crop_box_exact(img_w: u32, img_h: u32, aspect: f64, frame: &FrameParams) -> (f64, f64, f64, f64) {
    let (base_w, base_h) = cover_box(img_w, img_h, aspect);
    let zoom = frame.zoom.max(1.0);
    let (w, h) = (base_w / zoom, base_h / zoom);

    let (iw, ih) = (img_w as f64, img_h as f64);
    let cx = (iw / 2.0 + frame.pan_x * base_w).clamp(w / 2.0, iw - w / 2.0);
    let cy = (ih / 2.0 + frame.pan_y * base_h).clamp(h / 2.0, ih - h / 2.0);

    (cx - w / 2.0, cy - h / 2.0, w, h)
}

/// Crop rectangle for `frame`, rounded only at the edges.
pub fn crop_box(img_w: u32, img_h: u32, aspect: f64, frame: &FrameParams) -> CropBox {
    let (left, top, w, h) = crop_box_exact(img_w, img_h, aspect, frame);

    let x0 = (left.round() as u32).min(img_w - 1);
    let y0 = (top.round() as u32).min(img_h - 1);
    let x1 = ((left + w).round() as u32).clamp(x0 + 1, img_w);
    let y1 = ((top + h).round() as u32).clamp(y0 + 1, img_h);

    CropBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Render one frame at the target size.
pub fn render_frame(source: &RgbImage, frame: &FrameParams, target: &CanonicalTarget) -> RgbImage {
    let image: Cow<'_, RgbImage> = if frame.rotation.abs() > 1e-6 {
        Cow::Owned(rotate_expanded(source, frame.rotation))
    } else {
        Cow::Borrowed(source)
    };

    let b = crop_box(image.width(), image.height(), target.aspect_ratio(), frame);
    let cropped = imageops::crop_imm(image.as_ref(), b.x, b.y, b.width, b.height).to_image();
    imageops::resize(&cropped, target.width, target.height, FilterType::Lanczos3)
}

/// Rotate by `degrees` counter-clockwise, growing the canvas to keep every
/// source pixel. Uncovered corners are black.
pub fn rotate_expanded(source: &RgbImage, degrees: f64) -> RgbImage {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (sw, sh) = (source.width() as f64, source.height() as f64);
    // Tolerance keeps right angles from growing a pixel through float error
    let ow = (sw * cos.abs() + sh * sin.abs() - 1e-9).ceil().max(1.0) as u32;
    let oh = (sw * sin.abs() + sh * cos.abs() - 1e-9).ceil().max(1.0) as u32;

    let (scx, scy) = (sw / 2.0, sh / 2.0);
    let (ocx, ocy) = (ow as f64 / 2.0, oh as f64 / 2.0);

    RgbImage::from_fn(ow, oh, |x, y| {
        let dx = x as f64 + 0.5 - ocx;
        let dy = y as f64 + 0.5 - ocy;
        // Inverse rotation back into source space
        let sx = cos * dx - sin * dy + scx - 0.5;
        let sy = sin * dx + cos * dy + scy - 0.5;
        sample_bilinear(source, sx, sy)
    })
}

fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = (img.width() as f64, img.height() as f64);
    if x < -0.5 || y < -0.5 || x > w - 0.5 || y > h - 0.5 {
        return Rgb([0, 0, 0]);
    }
    let x = x.clamp(0.0, w - 1.0);
    let y = y.clamp(0.0, h - 1.0);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(img.width() - 1), (y0 + 1).min(img.height() - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let (p00, p10) = (img.get_pixel(x0, y0), img.get_pixel(x1, y0));
    let (p01, p11) = (img.get_pixel(x0, y1), img.get_pixel(x1, y1));

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// RNG for one request: seeded runs are reproducible per scene.
pub(crate) fn rng_for(seed: Option<u64>, salt: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_os_rng(),
    }
}

/// Ken Burns strategy; always applicable to a decodable still.
#[derive(Debug, Clone)]
pub struct ParametricKenBurns {
    target: CanonicalTarget,
    encoding: EncodingConfig,
    seed: Option<u64>,
}

impl ParametricKenBurns {
    pub fn new(target: CanonicalTarget, encoding: EncodingConfig) -> Self {
        Self {
            target,
            encoding,
            seed: None,
        }
    }

    /// Fix the seed for reproducible moves.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Parameters this strategy will use for `request`.
    pub fn params_for(&self, request: &MotionRequest) -> KenBurnsParams {
        KenBurnsParams::random(&mut rng_for(self.seed, request.salt))
    }
}

#[async_trait]
impl MotionStrategy for ParametricKenBurns {
    fn name(&self) -> &'static str {
        "ken_burns"
    }

    async fn synthesize(
        &self,
        request: &MotionRequest,
        workdir: &WorkDir,
        jobs: &MediaJobRunner,
    ) -> MediaResult<PathBuf> {
        let params = self.params_for(request);
        let count = frame_count(request.duration, self.target.fps);
        let frames_dir = workdir.subdir(&format!("ken-burns-{:04}", request.salt))?;
        debug!(
            image = %request.image.display(),
            frames = count,
            zoom_start = params.zoom_start,
            zoom_end = params.zoom_end,
            "Rendering Ken Burns frames"
        );

        let image = request.image.clone();
        let target = self.target.clone();
        let dir = frames_dir.clone();
        tokio::task::spawn_blocking(move || -> MediaResult<()> {
            let source = load_rgb(&image)?;
            render_sequence(&dir, count, |i| {
                render_frame(&source, &params.at(progress(i, count)), &target)
            })
        })
        .await
        .map_err(|e| MediaError::motion_failed(format!("frame renderer panicked: {}", e)))??;

        encode_frames(jobs, &frames_dir, request, &self.target, &self.encoding).await
    }
}
