//! Depth-layered parallax.
//!
//! A depth map is split into a handful of adaptive bands; each band becomes
//! a soft-edged RGBA slice that drifts horizontally by an amount that falls
//! off with depth, composited far to near over the unmoved image.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use reelforge_models::{CanonicalTarget, EncodingConfig};

use super::depth::DepthEstimator;
use super::frames::{fit_to_target, frame_count, load_rgb, progress, render_sequence};
use super::{encode_frames, MotionRequest, MotionStrategy};
use crate::error::{MediaError, MediaResult};
use crate::job::MediaJobRunner;
use crate::workdir::WorkDir;

/// Histogram resolution for band detection.
pub const HISTOGRAM_BINS: usize = 50;
/// Peaks below this share of the tallest bin are ignored.
pub const PEAK_FRACTION: f64 = 0.10;
/// Bands covering less than this share of pixels are merged away.
pub const MIN_BAND_FRACTION: f64 = 0.01;
/// Depth overlap added on both sides of a band's mask.
pub const MASK_OVERLAP: f32 = 0.05;
/// Peak horizontal drift of the nearest layer, as a share of width.
pub const MAX_PARALLAX_OFFSET: f64 = 0.03;
/// Phase step between consecutive layers.
pub const LAYER_PHASE: f64 = 0.2;
/// Gaussian sigma softening slice edges.
pub const EDGE_SIGMA: f32 = 1.0;

const MIN_BANDS: usize = 3;
const MAX_BANDS: usize = 5;
const UNIFORM_EDGES: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Per-pixel depth in [0, 1], 0 nearest.
#[derive(Debug, Clone)]
pub struct DepthField {
    pub width: u32,
    pub height: u32,
    values: Vec<f32>,
}

impl DepthField {
    /// Build from a brighter-is-nearer map, resized to `width x height` and
    /// stretched to the full range.
    pub fn from_luma(map: &GrayImage, width: u32, height: u32) -> Self {
        let resized = if map.dimensions() == (width, height) {
            map.clone()
        } else {
            imageops::resize(map, width, height, FilterType::Triangle)
        };

        let (min, max) = resized
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        let span = (max as f32 - min as f32).max(1.0);

        let values = resized
            .pixels()
            .map(|p| 1.0 - (p[0] as f32 - min as f32) / span)
            .collect();

        Self {
            width,
            height,
            values,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// A depth interval and the share of pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBand {
    pub lo: f32,
    pub hi: f32,
    pub fraction: f64,
}

impl DepthBand {
    /// Representative depth of the band.
    pub fn depth(&self) -> f32 {
        (self.lo + self.hi) / 2.0
    }
}

/// Pixel counts per depth bin.
pub fn histogram(values: &[f32]) -> [usize; HISTOGRAM_BINS] {
    let mut bins = [0usize; HISTOGRAM_BINS];
    for v in values {
        let idx = ((v.clamp(0.0, 1.0) * HISTOGRAM_BINS as f32) as usize).min(HISTOGRAM_BINS - 1);
        bins[idx] += 1;
    }
    bins
}

/// Local maxima of at least [`PEAK_FRACTION`] of the tallest bin.
pub fn find_peaks(hist: &[usize]) -> Vec<usize> {
    let tallest = hist.iter().copied().max().unwrap_or(0);
    if tallest == 0 {
        return Vec::new();
    }
    let floor = (tallest as f64 * PEAK_FRACTION).ceil() as usize;

    (0..hist.len())
        .filter(|&i| {
            let left = if i == 0 { 0 } else { hist[i - 1] };
            let right = hist.get(i + 1).copied().unwrap_or(0);
            hist[i] >= floor && hist[i] >= left && hist[i] > right
        })
        .collect()
}

/// Band boundaries: valleys between histogram peaks, or uniform quarters
/// when the histogram shows too little structure.
pub fn band_edges(hist: &[usize]) -> Vec<f32> {
    let mut peaks = find_peaks(hist);
    if peaks.len() < MIN_BANDS {
        return UNIFORM_EDGES.to_vec();
    }
    if peaks.len() > MAX_BANDS {
        peaks.sort_by(|a, b| hist[*b].cmp(&hist[*a]).then(a.cmp(b)));
        peaks.truncate(MAX_BANDS);
        peaks.sort_unstable();
    }

    let bin_width = 1.0 / hist.len() as f32;
    let mut edges = vec![0.0];
    for pair in peaks.windows(2) {
        // Middle of the lowest run between the two peaks
        let lowest = (pair[0]..=pair[1]).map(|i| hist[i]).min().unwrap_or(0);
        let run: Vec<usize> = (pair[0]..=pair[1]).filter(|&i| hist[i] == lowest).collect();
        let valley = run.get(run.len() / 2).copied().unwrap_or(pair[0]);
        edges.push((valley as f32 + 0.5) * bin_width);
    }
    edges.push(1.0);
    edges
}

/// Split the field into bands, merging ones below [`MIN_BAND_FRACTION`].
pub fn partition(field: &DepthField) -> Vec<DepthBand> {
    let values = field.values();
    let total = values.len().max(1) as f64;
    let edges = band_edges(&histogram(values));

    let mut bands: Vec<DepthBand> = edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let last = i == edges.len() - 2;
            let count = values
                .iter()
                .filter(|&&v| v >= w[0] && (v < w[1] || (last && v <= w[1])))
                .count();
            DepthBand {
                lo: w[0],
                hi: w[1],
                fraction: count as f64 / total,
            }
        })
        .collect();

    while bands.len() > 1 {
        let Some(idx) = bands.iter().position(|b| b.fraction < MIN_BAND_FRACTION) else {
            break;
        };
        let small = bands.remove(idx);
        let into = if idx < bands.len() { idx } else { idx - 1 };
        let neighbour = &mut bands[into];
        neighbour.lo = neighbour.lo.min(small.lo);
        neighbour.hi = neighbour.hi.max(small.hi);
        neighbour.fraction += small.fraction;
    }

    bands
}

/// A depth slice ready for compositing.
#[derive(Debug, Clone)]
pub struct Layer {
    pub image: RgbaImage,
    pub depth: f32,
}

/// Cut one soft-edged slice per band, ordered far to near.
pub fn build_layers(image: &RgbImage, field: &DepthField, bands: &[DepthBand]) -> Vec<Layer> {
    let mut layers: Vec<Layer> = bands
        .iter()
        .map(|band| {
            let (lo, hi) = (band.lo - MASK_OVERLAP, band.hi + MASK_OVERLAP);
            let mask = GrayImage::from_fn(field.width, field.height, |x, y| {
                let d = field.get(x, y);
                Luma([if d >= lo && d <= hi { 255 } else { 0 }])
            });
            // Open then close to drop specks and fill pinholes
            let mask = erode(&dilate(&dilate(&erode(&mask))));
            let alpha = imageops::blur(&mask, EDGE_SIGMA);

            let slice = RgbaImage::from_fn(field.width, field.height, |x, y| {
                let p = image.get_pixel(x, y);
                image::Rgba([p[0], p[1], p[2], alpha.get_pixel(x, y)[0]])
            });
            Layer {
                image: slice,
                depth: band.depth(),
            }
        })
        .collect();

    layers.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    layers
}

fn morph(mask: &GrayImage, grow: bool) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = if grow { 0u8 } else { 255u8 };
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let v = mask.get_pixel(nx, ny)[0];
                acc = if grow { acc.max(v) } else { acc.min(v) };
            }
        }
        Luma([acc])
    })
}

fn erode(mask: &GrayImage) -> GrayImage {
    morph(mask, false)
}

fn dilate(mask: &GrayImage) -> GrayImage {
    morph(mask, true)
}

/// Horizontal offset in pixels of layer `index` at progress `t`.
pub fn layer_offset(depth: f32, index: usize, t: f64, width: u32) -> i64 {
    let w = width as f64;
    let drift = MAX_PARALLAX_OFFSET * w * (1.0 - depth as f64) * (2.0 * PI * t + LAYER_PHASE * index as f64).sin();
    drift.clamp(-w / 4.0, w / 4.0).round() as i64
}

/// Composite all layers over the base image at progress `t`.
pub fn compose_frame(base: &RgbImage, layers: &[Layer], t: f64) -> RgbImage {
    let mut canvas = DynamicImage::ImageRgb8(base.clone()).to_rgba8();
    for (index, layer) in layers.iter().enumerate() {
        let dx = layer_offset(layer.depth, index, t, base.width());
        imageops::overlay(&mut canvas, &layer.image, dx, 0);
    }
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Parallax strategy; needs a depth map for the still.
#[derive(Clone)]
pub struct AdaptiveDepthParallax {
    depth: Arc<dyn DepthEstimator>,
    target: CanonicalTarget,
    encoding: EncodingConfig,
}

impl AdaptiveDepthParallax {
    pub fn new(depth: Arc<dyn DepthEstimator>, target: CanonicalTarget, encoding: EncodingConfig) -> Self {
        Self {
            depth,
            target,
            encoding,
        }
    }
}

#[async_trait]
impl MotionStrategy for AdaptiveDepthParallax {
    fn name(&self) -> &'static str {
        "parallax"
    }

    async fn synthesize(
        &self,
        request: &MotionRequest,
        workdir: &WorkDir,
        jobs: &MediaJobRunner,
    ) -> MediaResult<PathBuf> {
        let depth_map = self.depth.estimate(&request.image, workdir).await?;
        let count = frame_count(request.duration, self.target.fps);
        let frames_dir = workdir.subdir(&format!("parallax-{:04}", request.salt))?;

        let image = request.image.clone();
        let target = self.target.clone();
        let dir = frames_dir.clone();
        tokio::task::spawn_blocking(move || -> MediaResult<()> {
            let base = fit_to_target(&load_rgb(&image)?, &target);
            let field = DepthField::from_luma(&depth_map, base.width(), base.height());
            let bands = partition(&field);
            if bands.len() < 2 {
                return Err(MediaError::motion_failed("depth map has no usable layers"));
            }
            debug!(
                image = %image.display(),
                layers = bands.len(),
                frames = count,
                "Rendering parallax frames"
            );

            let layers = build_layers(&base, &field, &bands);
            render_sequence(&dir, count, |i| compose_frame(&base, &layers, progress(i, count)))
        })
        .await
        .map_err(|e| MediaError::motion_failed(format!("frame renderer panicked: {}", e)))??;

        encode_frames(jobs, &frames_dir, request, &self.target, &self.encoding).await
    }
}
