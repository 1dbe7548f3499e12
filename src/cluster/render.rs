//! Per-source block assembly state and duration emission.
//!
//! Render groups exist only for the duration of a single cluster render:
//! they are created on the stack when the walk first meets a source and
//! dropped before the render call returns.

use tracing::trace;

use crate::config::MuxConfig;
use crate::ebml::{BlobId, ClusterElement};
use crate::packet::Packet;
use crate::source::SourceRef;
use crate::timecode::round_to_scale;

/// Block assembly state for one source within one cluster render.
pub(crate) struct RenderGroup {
    pub source: SourceRef,
    /// Pre-rounding durations of the frames laced into the current block.
    pub durations: Vec<i64>,
    /// Blocks created for this source, in order.
    pub blobs: Vec<BlobId>,
    /// Whether the writer will accept more frames into the last block.
    pub more_data: bool,
    pub duration_mandatory: bool,
}

impl RenderGroup {
    pub(crate) fn new(source: SourceRef) -> Self {
        RenderGroup {
            source,
            durations: Vec::new(),
            blobs: Vec::new(),
            more_data: false,
            duration_mandatory: false,
        }
    }
}

/// Whether a BlockDuration is required for `durations.len()` frames
/// summing to `block_duration`, given the source's default duration.
///
/// A zero total never needs one. A mandatory duration is written unless it
/// equals frames × default exactly; otherwise one is written only when
/// durations are requested or a default exists, and the rounded total
/// differs from the rounded frames × default.
fn duration_required(
    cfg: &MuxConfig,
    mandatory: bool,
    block_duration: i64,
    frames: i64,
    def_duration: i64,
) -> bool {
    if block_duration == 0 {
        return false;
    }
    if mandatory {
        block_duration != frames * def_duration
    } else {
        (cfg.use_durations || def_duration > 0)
            && round_to_scale(block_duration, cfg.timecode_scale)
                != round_to_scale(frames * def_duration, cfg.timecode_scale)
    }
}

/// Finalize the duration of the group's last block, if one is required.
pub(crate) fn set_duration(cfg: &MuxConfig, rg: &RenderGroup, element: &mut dyn ClusterElement) {
    if rg.durations.is_empty() {
        return;
    }
    let Some(&blob) = rg.blobs.last() else {
        return;
    };

    let block_duration: i64 = rg.durations.iter().sum();
    let def_duration = rg.source.track_default_duration();
    trace!(
        block_duration,
        rounded = round_to_scale(block_duration, cfg.timecode_scale),
        def_duration,
        use_durations = cfg.use_durations,
        duration_mandatory = rg.duration_mandatory,
        "finalizing block duration"
    );

    if duration_required(
        cfg,
        rg.duration_mandatory,
        block_duration,
        rg.durations.len() as i64,
        def_duration,
    ) {
        element
            .blob_mut(blob)
            .set_block_duration(round_to_scale(block_duration, cfg.timecode_scale));
    }
}

/// Whether appending `new_packet` to `rg`'s current block would force a
/// BlockDuration (and with it a BlockGroup) to be written.
pub(crate) fn must_duration_be_set(cfg: &MuxConfig, rg: &RenderGroup, new_packet: &Packet) -> bool {
    let block_duration: i64 = rg.durations.iter().sum::<i64>() + new_packet.duration;
    let frames = rg.durations.len() as i64 + 1;
    let def_duration = rg.source.track_default_duration();

    duration_required(
        cfg,
        rg.duration_mandatory || new_packet.duration_mandatory,
        block_duration,
        frames,
        def_duration,
    )
}
