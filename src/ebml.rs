//! Contracts for the element writer and the segment-level output.
//!
//! The cluster core builds *structured* clusters (blocks, durations,
//! references, additions) and hands them to an element writer that owns
//! the actual EBML bit layout. Everything the core needs from that writer
//! (and from the segment-level file management around it) is captured by
//! the traits here, so the core can be driven against a real Matroska
//! serializer or a recording fake alike.

use std::io::{self, Write};

use crate::config::LacingMode;
use crate::memory::MemBuf;
use crate::source::TrackEntry;

/// How a block may be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBlobType {
    /// Use the compact SimpleBlock framing; the writer may still fall back.
    AlwaysSimple,
    /// Force a full BlockGroup (needed for durations, references with
    /// priorities, codec state and additions).
    NoSimple,
}

/// Handle to a block within one cluster element. Indices are only
/// meaningful for the cluster that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub usize);

/// One block under construction inside a cluster element.
pub trait BlockBlob {
    /// Append a frame. `rel_timecode`, `bref` and `fref` are already
    /// relative to the file's timecode offset; negative references mean
    /// absent. Returns whether further frames may still be laced into
    /// this block.
    fn add_frame_auto(
        &mut self,
        track: &TrackEntry,
        rel_timecode: i64,
        data: MemBuf,
        lacing: LacingMode,
        bref: i64,
        fref: i64,
    ) -> bool;

    fn set_block_duration(&mut self, duration: i64);

    /// Re-encode a SimpleBlock as a BlockGroup so group-only children can
    /// be attached. Returns whether the block is (now) a group.
    fn replace_simple_by_group(&mut self) -> bool;

    fn push_codec_state(&mut self, state: MemBuf);

    /// Attach one BlockMore child (`add_id` starts at 1).
    fn push_block_addition(&mut self, add_id: u64, blob: MemBuf);

    fn push_reference_priority(&mut self, priority: u64);
}

/// One cluster element under construction.
pub trait ClusterElement {
    /// Timecode of the preceding cluster, for cluster linking.
    fn set_previous_timecode(&mut self, timecode: i64, scale: i64);

    fn set_min_timecode(&mut self, timecode: i64);
    fn set_max_timecode(&mut self, timecode: i64);

    /// Mark that a track with signaled gaps contributed to this cluster.
    fn set_silent_track_used(&mut self);

    /// Create a new block of the given kind and return its handle.
    fn add_blob(&mut self, kind: BlockBlobType) -> BlobId;

    fn blob_mut(&mut self, id: BlobId) -> &mut dyn BlockBlob;

    /// Serialize the cluster to `out`, resolving cue positions through
    /// `cues`. Returns the number of bytes written.
    fn render(&mut self, out: &mut dyn SegmentOutput, cues: &mut dyn CueSink) -> io::Result<u64>;

    /// Absolute timecode of the rendered cluster.
    fn global_timecode(&self) -> i64;

    /// Serialized size of the element (valid after `render`).
    fn element_size(&self) -> u64;
}

/// The cue (index) table under construction for the current output file.
pub trait CueSink {
    /// Register a cue entry for a block. `timecode` is relative to the
    /// file's timecode offset.
    fn add_block_blob(&mut self, blob: BlobId, timecode: i64);

    /// Recompute the serialized size after new entries were added.
    fn update_size(&mut self);

    /// Current serialized size of the cue table.
    fn element_size(&self) -> u64;

    /// Forget all entries (file boundary).
    fn reset(&mut self);
}

/// Cue sink for runs that write no index at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCues;

impl CueSink for NullCues {
    fn add_block_blob(&mut self, _blob: BlobId, _timecode: i64) {}
    fn update_size(&mut self) {}
    fn element_size(&self) -> u64 {
        0
    }
    fn reset(&mut self) {}
}

/// Segment-level output: the byte sink plus the file-rotation machinery
/// around it. Implementations own file naming, segment headers and
/// seek-head bookkeeping; the cluster core only reports and requests.
pub trait SegmentOutput: Write {
    /// Current write position within the open file.
    fn position(&mut self) -> u64;

    /// Serialized size of the segment's tag elements, counted into the
    /// per-file header overhead for size-based splitting.
    fn tags_size(&self) -> i64 {
        0
    }

    /// 1-based number of the file currently open.
    fn file_num(&self) -> u32 {
        1
    }

    /// Finalize the current output file.
    fn finish_file(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Open the next output file of a split run.
    fn create_next_file(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// A cluster was rendered at `position`; segment writers that keep a
    /// seek head for cues record it here.
    fn index_cluster(&mut self, _global_timecode: i64, _position: u64) {}

    /// Construct an empty cluster element bound to this segment.
    fn new_cluster(&mut self) -> Box<dyn ClusterElement>;
}
