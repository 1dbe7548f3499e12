//! Xiph-style lacing of multiple frames into one payload.
//!
//! Layout: a leading count byte (`frames - 1`), then the size of every
//! frame except the last as a run of `255` bytes plus a remainder byte,
//! then the frame payloads back to back. The last frame's size is implied
//! by whatever remains.

use std::fmt;

use super::MemBuf;

/// Errors from [`unlace_xiph`] on malformed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaceError {
    /// The payload is empty or truncated inside the size prefix.
    TruncatedSizes,
    /// The size prefix describes more payload bytes than are present.
    TruncatedFrames,
}

impl fmt::Display for LaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaceError::TruncatedSizes => write!(f, "Xiph lace truncated inside its size prefix"),
            LaceError::TruncatedFrames => write!(f, "Xiph lace sizes exceed the payload"),
        }
    }
}

impl std::error::Error for LaceError {}

/// Lace `frames` into a single owned buffer.
///
/// Panics when `frames` is empty or holds more than 256 entries (the count
/// byte cannot express either).
pub fn lace_xiph(frames: &[MemBuf]) -> MemBuf {
    assert!(
        !frames.is_empty() && frames.len() <= 256,
        "Xiph lacing supports 1..=256 frames"
    );

    let mut total = 1;
    for frame in &frames[..frames.len() - 1] {
        total += frame.len() / 255 + 1 + frame.len();
    }
    total += frames[frames.len() - 1].len();

    let laced = MemBuf::alloc(total);
    {
        let mut out = laced.bytes_mut();
        out[0] = (frames.len() - 1) as u8;
        let mut pos = 1;
        for frame in &frames[..frames.len() - 1] {
            let mut n = frame.len();
            while n >= 255 {
                out[pos] = 255;
                pos += 1;
                n -= 255;
            }
            out[pos] = n as u8;
            pos += 1;
        }
        for frame in frames {
            out[pos..pos + frame.len()].copy_from_slice(&frame.bytes());
            pos += frame.len();
        }
    }
    laced
}

/// Split a Xiph-laced payload back into its frames. Each returned frame
/// owns a copy of its bytes.
pub fn unlace_xiph(laced: &MemBuf) -> Result<Vec<MemBuf>, LaceError> {
    let bytes = laced.bytes();
    if bytes.is_empty() {
        return Err(LaceError::TruncatedSizes);
    }

    let frame_count = bytes[0] as usize + 1;
    let mut pos = 1;

    let mut sizes = Vec::with_capacity(frame_count);
    for _ in 0..frame_count - 1 {
        let mut size = 0;
        loop {
            let b = *bytes.get(pos).ok_or(LaceError::TruncatedSizes)?;
            pos += 1;
            size += b as usize;
            if b != 255 {
                break;
            }
        }
        sizes.push(size);
    }

    let described: usize = sizes.iter().sum();
    if pos + described > bytes.len() {
        return Err(LaceError::TruncatedFrames);
    }
    sizes.push(bytes.len() - pos - described);

    let mut frames = Vec::with_capacity(frame_count);
    for size in sizes {
        frames.push(MemBuf::from_slice(&bytes[pos..pos + size]));
        pos += size;
    }
    Ok(frames)
}
