//! Reference-counted byte buffers and the multi-slice read cursor.
//!
//! Every payload travelling through the muxing pipeline is held in a
//! [`MemBuf`]: a cheaply cloneable handle over a byte region that is either
//! owned by the handle group or borrowed from an external party. The
//! [`SliceCursor`] presents a deque of such buffers as one contiguous,
//! forward-only byte stream without copying.

mod buffer;
mod cursor;
mod lace;

pub use buffer::MemBuf;
pub use cursor::SliceCursor;
pub use lace::{lace_xiph, unlace_xiph, LaceError};
