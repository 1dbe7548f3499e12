//! Error type for the muxing core.
//!
//! The core has no recoverable errors: every variant is either a fatal
//! inconsistency in the input stream, a misuse of the API, or a failure of
//! the output side. Callers are expected to abort the muxing run and report
//! the diagnostic context carried by the variant.

use std::fmt;
use std::io;

/// Result alias used throughout the crate.
pub type MuxResult<T> = Result<T, MuxError>;

/// Fatal errors raised by the cluster core.
#[derive(Debug)]
pub enum MuxError {
    /// A back-reference names a timecode for which no packet is retained.
    /// The input stream is inconsistent; rendering cannot continue.
    UnresolvedReference {
        /// Timecode of the referring packet.
        timecode: i64,
        /// The reference that failed to resolve.
        ref_timecode: i64,
        /// Diagnostic id of the producing track.
        source_id: u64,
    },
    /// A packet was ingested before an output was bound with `set_output`.
    OutputNotSet,
    /// The element writer failed while serializing a cluster.
    Io(io::Error),
    /// The segment-level writer failed to rotate output files.
    Output(anyhow::Error),
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::UnresolvedReference {
                timecode,
                ref_timecode,
                source_id,
            } => write!(
                f,
                "backward reference could not be resolved ({timecode} -> {ref_timecode}, track {source_id})"
            ),
            MuxError::OutputNotSet => write!(f, "no output bound; call set_output first"),
            MuxError::Io(err) => write!(f, "cluster rendering failed: {err}"),
            MuxError::Output(err) => write!(f, "output file rotation failed: {err}"),
        }
    }
}

impl std::error::Error for MuxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MuxError::Io(err) => Some(err),
            MuxError::Output(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for MuxError {
    fn from(err: io::Error) -> Self {
        MuxError::Io(err)
    }
}
