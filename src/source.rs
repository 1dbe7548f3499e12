//! The packetizer-side contract.
//!
//! The cluster core never looks inside a track's packetizer; everything it
//! needs is pulled through [`PacketSource`]. The two feedback channels
//! (`set_last_cue_timecode`, `set_free_refs`) take `&self`: sources keep
//! those fields in `Cell`s, and the core guarantees it never calls back
//! re-entrantly.

use std::rc::Rc;

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Subtitles,
}

/// Per-track cue (index) generation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueStrategy {
    #[default]
    Unspecified,
    /// No cue entries for this track.
    None,
    /// One entry per key frame.
    IFrames,
    /// One entry per block.
    All,
    /// Audio-only files: one entry every couple of seconds.
    Sparse,
}

/// The slice of a track's header the block writer and the cluster core
/// consult while emitting frames.
#[derive(Debug, Clone, Copy)]
pub struct TrackEntry {
    pub track_number: u64,
    pub lacing_enabled: bool,
}

/// Contract a packet-producing track implements for the cluster core.
pub trait PacketSource {
    /// Stable diagnostic id, used in error and log output.
    fn id(&self) -> u64;

    fn track_type(&self) -> TrackType;

    /// Default frame duration from the track header, or 0 when absent.
    fn track_default_duration(&self) -> i64;

    fn track_entry(&self) -> TrackEntry;

    fn cue_strategy(&self) -> CueStrategy;

    /// Timecode of the last cue entry written for this track; negative
    /// when none has been written yet.
    fn last_cue_timecode(&self) -> i64;
    fn set_last_cue_timecode(&self, timecode: i64);

    /// Highest timecode the core has declared no longer referenced.
    fn free_refs(&self) -> i64;
    fn set_free_refs(&self, timecode: i64);

    /// Whether this track has signaled gaps (drives SilentTrackUsed).
    fn contains_gap(&self) -> bool;

    /// Slack allowed when matching reference timecodes against retained
    /// packets, in nanoseconds. 0 selects the built-in default.
    fn reference_timecode_tolerance(&self) -> i64;
}

/// Shared handle to a packet source. Identity (pointer equality) is what
/// groups packets of the same track.
pub type SourceRef = Rc<dyn PacketSource>;
