//! FFmpeg filter graphs used by the compositor.

use std::path::Path;

use reelforge_models::CanonicalTarget;

/// Default music bed level relative to narration.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.15;

/// Scale-then-center-crop plan that fills the target without letterboxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePlan {
    pub scale_width: u32,
    pub scale_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

impl ScalePlan {
    /// Plan for a `src_w x src_h` source onto the target.
    ///
    /// A source wider than the target is scaled to the target height and
    /// overflows horizontally; otherwise it is scaled to the target width and
    /// overflows vertically. The overflowing side is rounded to an even size.
    pub fn cover(src_w: u32, src_h: u32, target: &CanonicalTarget) -> Option<Self> {
        if src_w == 0 || src_h == 0 || target.width == 0 || target.height == 0 {
            return None;
        }

        let src_aspect = src_w as f64 / src_h as f64;
        let (scale_width, scale_height) = if src_aspect > target.aspect_ratio() {
            let w = round_even(target.height as f64 * src_aspect).max(target.width);
            (w, target.height)
        } else {
            let h = round_even(target.width as f64 / src_aspect).max(target.height);
            (target.width, h)
        };

        Some(Self {
            scale_width,
            scale_height,
            crop_x: (scale_width - target.width) / 2,
            crop_y: (scale_height - target.height) / 2,
        })
    }
}

fn round_even(x: f64) -> u32 {
    ((x / 2.0).round() as u32) * 2
}

/// Filter chain rewriting a clip to the canonical target.
///
/// Without known source dimensions FFmpeg computes the cover scale itself.
pub fn normalize_filter(plan: Option<ScalePlan>, target: &CanonicalTarget) -> String {
    let scale_crop = match plan {
        Some(p) => format!(
            "scale={}:{}:flags=lanczos,crop={}:{}:{}:{}",
            p.scale_width, p.scale_height, target.width, target.height, p.crop_x, p.crop_y
        ),
        None => format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase:flags=lanczos,crop={w}:{h}",
            w = target.width,
            h = target.height
        ),
    };
    format!(
        "{},fps={},format={},setsar=1",
        scale_crop, target.fps, target.pixel_format
    )
}

/// Concat demuxer list file contents.
pub fn concat_list<P: AsRef<Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Audio-only concat filter over `n` inputs, labelled `[a]`.
pub fn audio_concat_filter(n: usize) -> String {
    let inputs: String = (0..n).map(|i| format!("[{}:a]", i)).collect();
    format!("{}concat=n={}:v=0:a=1[a]", inputs, n)
}

/// Mix a looped music bed (input 1) under narration (input 0), labelled `[a]`.
///
/// The mix lasts exactly as long as the narration.
pub fn music_mix_filter(volume: f64) -> String {
    format!(
        "[1:a]volume={:.3}[m];[0:a][m]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[a]",
        volume
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> CanonicalTarget {
        CanonicalTarget::new(1920, 1080, 30)
    }

    #[test]
    fn test_wider_source_overflows_width() {
        // 2.39:1 footage onto 16:9
        let plan = ScalePlan::cover(2390, 1000, &target()).unwrap();
        assert_eq!(plan.scale_height, 1080);
        assert!(plan.scale_width > 1920);
        assert_eq!(plan.scale_width % 2, 0);
        assert_eq!(plan.crop_y, 0);
        assert_eq!(plan.crop_x, (plan.scale_width - 1920) / 2);
    }

    #[test]
    fn test_taller_source_overflows_height() {
        // Portrait phone footage onto 16:9
        let plan = ScalePlan::cover(1080, 1920, &target()).unwrap();
        assert_eq!(plan.scale_width, 1920);
        assert_eq!(plan.scale_height, 3414);
        assert_eq!(plan.crop_x, 0);
        assert_eq!(plan.crop_y, (3414 - 1080) / 2);
    }

    #[test]
    fn test_matching_aspect_is_plain_scale() {
        let plan = ScalePlan::cover(1280, 720, &target()).unwrap();
        assert_eq!((plan.scale_width, plan.scale_height), (1920, 1080));
        assert_eq!((plan.crop_x, plan.crop_y), (0, 0));
    }

    #[test]
    fn test_unknown_dimensions() {
        assert!(ScalePlan::cover(0, 720, &target()).is_none());
        let filter = normalize_filter(None, &target());
        assert!(filter.contains("force_original_aspect_ratio=increase"));
        assert!(filter.ends_with("fps=30,format=yuv420p,setsar=1"));
    }

    #[test]
    fn test_normalize_filter() {
        let plan = ScalePlan::cover(1280, 720, &target());
        assert_eq!(
            normalize_filter(plan, &target()),
            "scale=1920:1080:flags=lanczos,crop=1920:1080:0:0,fps=30,format=yuv420p,setsar=1"
        );
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&["/tmp/a.mp4", "/tmp/it's.mp4"]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_audio_filters() {
        assert_eq!(audio_concat_filter(3), "[0:a][1:a][2:a]concat=n=3:v=0:a=1[a]");
        let mix = music_mix_filter(DEFAULT_MUSIC_VOLUME);
        assert!(mix.starts_with("[1:a]volume=0.150[m]"));
        assert!(mix.contains("duration=first"));
    }
}
