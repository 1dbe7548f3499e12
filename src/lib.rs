// mkmux — Matroska cluster assembly and rendering core

pub mod cluster;
pub mod config;
pub mod ebml;
pub mod error;
pub mod memory;
pub mod packet;
pub mod source;
pub mod timecode;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// The orchestrator: ingests packets, forms clusters, renders them and
/// rotates output files.
pub use cluster::ClusterHelper;
/// Hard cap on per-cluster payload bytes imposed by the container format.
pub use cluster::MAX_CLUSTER_CONTENT_SIZE;
/// Output-file rotation triggers.
pub use cluster::{SplitKind, SplitPoint};
/// Session configuration.
pub use config::{LacingMode, MuxConfig};
/// Contracts of the element writer and the segment-level output.
pub use ebml::{
    BlobId, BlockBlob, BlockBlobType, ClusterElement, CueSink, NullCues, SegmentOutput,
};
/// Fail-fast error type of the core.
pub use error::{MuxError, MuxResult};
/// Shared byte buffers and the multi-slice read cursor.
pub use memory::{lace_xiph, unlace_xiph, LaceError, MemBuf, SliceCursor};
/// The unit of work produced by packetizers.
pub use packet::Packet;
/// The packetizer-side contract.
pub use source::{CueStrategy, PacketSource, SourceRef, TrackEntry, TrackType};
/// Timecode arithmetic.
pub use timecode::{round_to_scale, Timecode};
