//! Timecode arithmetic.
//!
//! All timecodes in the core are signed nanosecond counts. The file itself
//! stores ticks of `timecode_scale` nanoseconds, so ingested timecodes are
//! rounded to that precision before any boundary decisions are made.

/// A point in time or a span, in nanoseconds. Negative values are used as
/// "absent" sentinels (`-1`) for references and first/min/max trackers.
pub type Timecode = i64;

/// Round `tc` down to a whole number of `scale`-nanosecond ticks.
///
/// This is the precision the on-wire format carries; applying it on ingress
/// keeps in-memory comparisons consistent with what a demuxer will read back.
#[inline]
pub const fn round_to_scale(tc: Timecode, scale: u64) -> Timecode {
    (tc / scale as i64) * scale as i64
}
