//! Recorded detector output as a frame source.
//!
//! One frame per line:
//!
//! ```text
//! (:hands ((:label right :score 0.93 :points ((0.5 0.9 0.0) ...))))
//! (:hands nil)
//! ```
//!
//! Blank lines and lines starting with `;` are skipped.  A line that does
//! not parse is an acquisition failure and ends the stream.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};

use super::{Frame, FramePayload, FrameSource, LandmarkDetector};
use crate::hand::{hands_sexp, HandLandmarks};
use crate::sexp::{list_items, plist_get};

/// Replay line for one frame's detections.
pub fn frame_line(hands: &[HandLandmarks]) -> String {
    format!("(:hands {})", hands_sexp(hands))
}

/// Parse one replay line.
pub fn parse_frame_line(line: &str) -> anyhow::Result<Vec<HandLandmarks>> {
    let value = lexpr::from_str(line).map_err(|e| anyhow!("malformed s-expression: {e}"))?;
    let raw = plist_get(&value, "hands").context("missing :hands")?;
    let items = list_items(raw).context(":hands is not a list")?;
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| HandLandmarks::from_sexp(v).with_context(|| format!("hand {i} is malformed")))
        .collect()
}

/// Frame source reading a replay file, optionally paced to a frame rate.
pub struct ReplaySource<R> {
    lines: Lines<R>,
    line_no: usize,
    index: u64,
    interval: Option<Duration>,
    started: Instant,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening replay {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            index: 0,
            interval: None,
            started: Instant::now(),
        }
    }

    /// Deliver at most `fps` frames per second.  Zero disables pacing.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.interval = (fps > 0).then(|| Duration::from_secs(1) / fps);
        self
    }

    fn pace(&self) {
        if let Some(interval) = self.interval {
            let due = interval * self.index as u32;
            let elapsed = self.started.elapsed();
            if due > elapsed {
                std::thread::sleep(due - elapsed);
            }
        }
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    fn read_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.with_context(|| format!("reading replay line {}", self.line_no))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }

            let hands = parse_frame_line(trimmed)
                .with_context(|| format!("replay line {}", self.line_no))?;
            self.pace();
            let frame = Frame {
                index: self.index,
                timestamp: self.started.elapsed(),
                payload: FramePayload::Recorded(hands),
            };
            self.index += 1;
            return Ok(Some(frame));
        }
    }
}

/// Detector that returns the detections stored in recorded frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordedDetector;

impl LandmarkDetector for RecordedDetector {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandLandmarks>> {
        match &frame.payload {
            FramePayload::Recorded(hands) => Ok(hands.clone()),
            FramePayload::Image { width, height, .. } => {
                bail!("recorded detector cannot infer on a live {width}x{height} image")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::open_hand;
    use crate::hand::Handedness;
    use std::io::Cursor;

    fn source(text: &str) -> ReplaySource<Cursor<Vec<u8>>> {
        ReplaySource::from_reader(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_frame_line_parses_back() {
        let hand = open_hand(Handedness::Right).with_score(0.8);
        let hands = parse_frame_line(&frame_line(&[hand])).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].handedness(), Handedness::Right);
        assert!((hands[0].score() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_frame() {
        assert!(parse_frame_line("(:hands nil)").unwrap().is_empty());
        assert!(parse_frame_line("(:hands ())").unwrap().is_empty());
    }

    #[test]
    fn test_bad_lines() {
        assert!(parse_frame_line("(:hands").is_err());
        assert!(parse_frame_line("(:other 1)").is_err());
        assert!(parse_frame_line("(:hands ((:label right :points ((0 0 0)))))").is_err());
    }

    #[test]
    fn test_source_skips_comments() {
        let line = frame_line(&[open_hand(Handedness::Left)]);
        let text = format!("; recorded\n\n{line}\n(:hands nil)\n");
        let mut src = source(&text);
        let first = src.read_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        let second = src.read_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert!(src.read_frame().unwrap().is_none());

        let mut det = RecordedDetector;
        assert_eq!(det.detect(&first).unwrap().len(), 1);
        assert!(det.detect(&second).unwrap().is_empty());
    }

    #[test]
    fn test_source_error_on_garbage() {
        let mut src = source("(:hands nil)\nnot a frame (\n");
        assert!(src.read_frame().unwrap().is_some());
        let err = src.read_frame().unwrap_err();
        assert!(format!("{err:#}").contains("replay line 2"));
    }

    #[test]
    fn test_detector_rejects_images() {
        let frame = Frame {
            index: 0,
            timestamp: Duration::ZERO,
            payload: FramePayload::Image {
                width: 2,
                height: 2,
                rgb: vec![0; 12],
            },
        };
        assert!(RecordedDetector.detect(&frame).is_err());
    }
}
