//! The unit of work flowing from packetizers into the cluster core.

use crate::ebml::BlobId;
use crate::memory::MemBuf;
use crate::source::SourceRef;

/// One media frame (or laced frame run) plus the decisions its packetizer
/// already made about it.
///
/// Timecode fields are nanoseconds; `bref`/`fref` are the timecodes of the
/// backward/forward reference frames, `-1` meaning absent. The
/// `unmodified_*` copies preserve the pre-rounding values for duration
/// accounting, and are filled in by the cluster helper on ingestion along
/// with `packet_num`.
pub struct Packet {
    /// Frame payload. Taken (dropped) as soon as the owning cluster has
    /// been rendered.
    pub data: Option<MemBuf>,
    /// New codec state taking effect at this frame, if any.
    pub codec_state: Option<MemBuf>,
    /// BlockAddition payloads, in AddID order.
    pub data_adds: Vec<MemBuf>,

    /// Producing track.
    pub source: SourceRef,

    pub timecode: i64,
    pub duration: i64,
    pub bref: i64,
    pub fref: i64,
    /// Final timecode after the packetizer's reordering/offsetting.
    pub assigned_timecode: i64,

    /// The duration must be written even if a default duration would
    /// reconstruct it.
    pub duration_mandatory: bool,
    /// A gap in this track follows; the cluster closes after this packet.
    pub gap_following: bool,
    /// ReferencePriority to attach, 0 = none.
    pub ref_priority: u8,

    pub unmodified_assigned_timecode: i64,
    pub unmodified_duration: i64,

    /// Ingestion order, assigned by the cluster helper.
    pub packet_num: u64,
    /// Set once the reference GC has decided nothing refers to this
    /// packet anymore.
    pub superseeded: bool,
    /// Block the packet was rendered into.
    pub group: Option<BlobId>,
}

impl Packet {
    /// A packet with the given payload and timecodes; references default
    /// to absent and all render-time fields to their initial state.
    pub fn new(source: SourceRef, data: MemBuf, timecode: i64, duration: i64) -> Self {
        Packet {
            data: Some(data),
            codec_state: None,
            data_adds: Vec::new(),
            source,
            timecode,
            duration,
            bref: -1,
            fref: -1,
            assigned_timecode: timecode,
            duration_mandatory: false,
            gap_following: false,
            ref_priority: 0,
            unmodified_assigned_timecode: 0,
            unmodified_duration: 0,
            packet_num: 0,
            superseeded: false,
            group: None,
        }
    }

    /// Visible payload size, 0 once the payload has been released.
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, MemBuf::len)
    }

    /// A key frame references nothing in either direction.
    pub fn is_key(&self) -> bool {
        self.bref == -1 && self.fref == -1
    }
}
