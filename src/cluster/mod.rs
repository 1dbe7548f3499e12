//! Cluster assembly: packet ingestion, boundary and split decisions,
//! rendering coordination and reference bookkeeping.

mod helper;
mod render;
mod split;

pub use helper::ClusterHelper;
pub use split::{SplitKind, SplitPoint};

use crate::ebml::ClusterElement;
use crate::packet::Packet;

/// Hard cap on the payload bytes of a single cluster, imposed by the
/// container format.
pub const MAX_CLUSTER_CONTENT_SIZE: i64 = 1_500_000;

/// One cluster under assembly or retained for reference resolution.
pub(crate) struct ClusterContents {
    pub element: Box<dyn ClusterElement>,
    pub packets: Vec<Packet>,
    pub rendered: bool,
    pub is_referenced: bool,
}

impl ClusterContents {
    pub(crate) fn new(element: Box<dyn ClusterElement>) -> Self {
        ClusterContents {
            element,
            packets: Vec::new(),
            rendered: false,
            is_referenced: false,
        }
    }
}
