use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::crop::Rect;

/// A failure to obtain the bounding box of a single page. Recovered per page: the affected
/// page keeps its current geometry, siblings are unaffected.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("could not launch the bounding box renderer: {0}")]
    Spawn(std::io::Error),
    #[error("bounding box renderer failed: {0}")]
    Failed(String),
    #[error("bounding box renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("no bounding box reported for page {0}")]
    MissingPage(usize),
}

/// Source of per-page content bounding boxes, in the unrotated rendering's point space.
///
/// The core treats the provider as a black box; whatever rotation convention it renders
/// under is mapped away by the crop planner.
pub trait BoundsProvider {
    fn bounds(&mut self, page_index: usize) -> Result<Rect, PlanningError>;
}

/// The same caller-supplied rectangle for every page.
pub struct FixedBounds(pub Rect);

impl BoundsProvider for FixedBounds {
    fn bounds(&mut self, _page_index: usize) -> Result<Rect, PlanningError> {
        Ok(self.0)
    }
}

/// Bounding boxes pre-recorded as `%%BoundingBox: llx lly urx ury` lines, one per page in
/// display order. The format matches what GhostScript's bbox device prints, so a captured
/// run can be replayed.
pub struct RecordedBounds {
    boxes: Vec<Option<Rect>>,
}

impl RecordedBounds {
    pub fn parse(text: &str) -> Self {
        let boxes = text.lines()
            .filter_map(|line| line.strip_prefix("%%BoundingBox:"))
            .map(parse_bbox_line)
            .collect();
        Self { boxes }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }
}

impl BoundsProvider for RecordedBounds {
    fn bounds(&mut self, page_index: usize) -> Result<Rect, PlanningError> {
        self.boxes.get(page_index)
            .copied()
            .flatten()
            .ok_or(PlanningError::MissingPage(page_index))
    }
}

fn parse_bbox_line(rest: &str) -> Option<Rect> {
    let vals = rest.split_whitespace()
        .map(|part| part.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let &[llx, lly, urx, ury] = &vals[..] else { return None };
    Some(Rect::new(llx, lly, urx, ury))
}

/// Runs GhostScript's `bbox` device over the whole document once, under a timeout, and
/// serves the reported boxes per page.
///
/// One bad page only degrades that page: a `%%BoundingBox` line that is missing or does not
/// parse surfaces as [`PlanningError::MissingPage`] for its index.
pub struct Ghostscript {
    path: PathBuf,
    resolution: u32,
    timeout: Duration,
    state: State,
}

enum State {
    Pending,
    Ready(Vec<Option<Rect>>),
    Broken(String),
}

impl Ghostscript {
    pub fn new(path: impl Into<PathBuf>, resolution: u32, timeout: Duration) -> Self {
        Self { path: path.into(), resolution, timeout, state: State::Pending }
    }

    fn run(&self) -> Result<Vec<Option<Rect>>, PlanningError> {
        let mut child = Command::new("gs")
            .args(["-dBATCH", "-dNOPAUSE", "-dSAFER", "-sDEVICE=bbox"])
            .arg(format!("-r{}", self.resolution))
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(PlanningError::Spawn)?;

        // the bbox device reports on stderr; drain it concurrently so gs cannot block on a
        // full pipe while we wait
        let mut stderr = child.stderr.take()
            .ok_or_else(|| PlanningError::Failed("stderr not captured".to_owned()))?;
        let drain = std::thread::spawn(move || {
            let mut text = String::new();
            stderr.read_to_string(&mut text).map(|_| text)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait().map_err(PlanningError::Spawn)? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PlanningError::Timeout(self.timeout));
                },
                None => std::thread::sleep(Duration::from_millis(50))
            }
        };
        let text = match drain.join() {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(PlanningError::Failed(err.to_string())),
            Err(_) => return Err(PlanningError::Failed("output reader panicked".to_owned()))
        };
        if !status.success() {
            return Err(PlanningError::Failed(format!("gs exited with {status}")));
        }
        log::debug!("gs reported {} bounding box line(s) for {}",
            text.lines().filter(|line| line.starts_with("%%BoundingBox:")).count(),
            self.path.display());
        Ok(RecordedBounds::parse(&text).boxes)
    }
}

impl BoundsProvider for Ghostscript {
    fn bounds(&mut self, page_index: usize) -> Result<Rect, PlanningError> {
        if matches!(self.state, State::Pending) {
            self.state = match self.run() {
                Ok(boxes) => State::Ready(boxes),
                Err(err) => State::Broken(err.to_string())
            };
        }
        match &self.state {
            State::Ready(boxes) => boxes.get(page_index)
                .copied()
                .flatten()
                .ok_or(PlanningError::MissingPage(page_index)),
            State::Broken(msg) => Err(PlanningError::Failed(msg.clone())),
            State::Pending => unreachable!()
        }
    }
}
