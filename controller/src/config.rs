//! Runtime configuration.
//!
//! Every threshold used by classification and pointer control lives in
//! `ControllerConfig`; stream plumbing lives in `PipelineConfig`.  Both
//! default to the tuned values and are overridden from the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::control::PointerConfig;
use crate::gesture::ClassifierConfig;
use crate::sexp::bool_sexp;

/// Per-stream classification and control tuning.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Right hand is the Major hand.
    pub dominant_right: bool,
    pub classifier: ClassifierConfig,
    pub pointer: PointerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dominant_right: true,
            classifier: ClassifierConfig::default(),
            pointer: PointerConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn with_move_duration(mut self, duration: Duration) -> Self {
        self.pointer.move_duration = duration;
        self
    }

    /// Generate IPC s-expression for the active thresholds.
    pub fn to_sexp(&self) -> String {
        let c = &self.classifier;
        let p = &self.pointer;
        format!(
            "(:dominant {} :pinch-distance {:.3} :v-ratio {:.2} :closed-depth {:.2} :stable-streak {} :open-ratio {:.2} :pinch-threshold {:.2} :hold-frames {} :volume-divisor {:.1} :move-duration-ms {})",
            if self.dominant_right { "right" } else { "left" },
            c.pinch_distance,
            c.v_ratio,
            c.closed_depth,
            c.stable_streak,
            c.finger.open_ratio,
            p.pinch.threshold,
            p.pinch.hold_frames,
            p.volume_divisor,
            p.move_duration.as_millis(),
        )
    }
}

/// Frame acquisition and detection settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hands scoring below this are dropped when nothing was tracked in
    /// the previous frame.
    pub min_detection_confidence: f32,
    /// Threshold while hands are being tracked from frame to frame.
    pub min_tracking_confidence: f32,
    /// Detector output is truncated to this many hands.
    pub max_hands: usize,
    /// Gesture-to-action mapping file.
    pub mapping_path: PathBuf,
    /// Virtual screen size for the headless injector.
    pub screen: (u32, u32),
    /// Whether the processing gate starts open.
    pub start_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            max_hands: 2,
            mapping_path: default_mapping_path(),
            screen: (1920, 1080),
            start_enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Generate IPC s-expression for pipeline settings.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:min-detection-confidence {:.2} :min-tracking-confidence {:.2} :max-hands {} :mapping \"{}\" :screen ({} {}) :start-enabled {})",
            self.min_detection_confidence,
            self.min_tracking_confidence,
            self.max_hands,
            crate::sexp::escape_string(&self.mapping_path.display().to_string()),
            self.screen.0,
            self.screen.1,
            bool_sexp(self.start_enabled),
        )
    }
}

/// `$XDG_CONFIG_HOME/gesture-pointer/mapping.sexp`, falling back to
/// `~/.config`.
pub fn default_mapping_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("gesture-pointer").join("mapping.sexp")
}

/// Parse a "WxH" resolution string.
pub fn parse_resolution(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .split_once('x')
        .with_context(|| format!("resolution {s:?} is not WxH"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in {s:?}"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in {s:?}"))?;
    if w == 0 || h == 0 {
        bail!("resolution {s:?} has a zero dimension");
    }
    Ok((w, h))
}

/// Parse a confidence threshold in [0, 1].
pub fn parse_confidence(s: &str) -> anyhow::Result<f32> {
    let v: f32 = s.trim().parse().with_context(|| format!("bad confidence {s:?}"))?;
    if !(0.0..=1.0).contains(&v) {
        bail!("confidence {v} outside [0, 1]");
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_defaults() {
        let config = ControllerConfig::default();
        assert!(config.dominant_right);
        assert_eq!(config.classifier.stable_streak, 4);
        assert_eq!(config.pointer.pinch.hold_frames, 5);
        assert_eq!(config.pointer.volume_divisor, 50.0);
        assert_eq!(config.pointer.move_duration, Duration::from_millis(100));
        assert_eq!(config.pointer.curve.flick_gain, 2.1);
    }

    #[test]
    fn test_controller_sexp() {
        let sexp = ControllerConfig::default()
            .with_move_duration(Duration::from_millis(40))
            .to_sexp();
        assert!(sexp.contains(":dominant right"));
        assert!(sexp.contains(":pinch-distance 0.050"));
        assert!(sexp.contains(":move-duration-ms 40"));
        assert!(lexpr::from_str(&sexp).is_ok());
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("640x480").unwrap(), (640, 480));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("axb").is_err());
        assert!(parse_resolution("-1x5").is_err());
    }

    #[test]
    fn test_parse_confidence() {
        assert_eq!(parse_confidence("0.7").unwrap(), 0.7);
        assert!(parse_confidence("1.5").is_err());
        assert!(parse_confidence("high").is_err());
    }

    #[test]
    fn test_default_mapping_path_name() {
        let path = default_mapping_path();
        assert!(path.ends_with("gesture-pointer/mapping.sexp"));
    }

    #[test]
    fn test_pipeline_sexp() {
        let sexp = PipelineConfig::default().to_sexp();
        assert!(sexp.contains(":max-hands 2"));
        assert!(sexp.contains(":screen (1920 1080)"));
        assert!(sexp.contains(":start-enabled t"));
    }
}
