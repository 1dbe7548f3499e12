//! Output-file split triggers.

/// What a split point's threshold means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// Rotate before the estimated file size reaches `point` bytes.
    Size,
    /// Rotate once a file spans `point` nanoseconds.
    Duration,
    /// Rotate at the absolute timecode `point`.
    Timecode,
}

/// A registered rule for rotating the output file.
///
/// Split points form an ordered list; the active one is addressed by
/// index, and `use_once` points are consumed by advancing that index.
#[derive(Debug, Clone, Copy)]
pub struct SplitPoint {
    pub point: i64,
    pub kind: SplitKind,
    pub use_once: bool,
}

impl SplitPoint {
    pub fn new(point: i64, kind: SplitKind, use_once: bool) -> Self {
        SplitPoint {
            point,
            kind,
            use_once,
        }
    }
}
