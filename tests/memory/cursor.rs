// Unit tests for the slice cursor: sequential reads across slice
// boundaries, resets, and random-access copies.

use mkmux::{MemBuf, SliceCursor};
use proptest::prelude::*;
use proptest::sample::Index;

fn cursor_over(parts: &[&[u8]]) -> SliceCursor {
    let mut cursor = SliceCursor::new();
    for part in parts {
        cursor.add_slice(MemBuf::from_slice(part));
    }
    cursor
}

#[test]
fn empty_cursor_has_nothing_available() {
    let cursor = SliceCursor::new();
    assert!(!cursor.char_available());
    assert_eq!(cursor.size(), 0);
    assert_eq!(cursor.remaining(), 0);
    assert_eq!(cursor.position(), 0);
}

#[test]
fn zero_sized_slices_are_ignored() {
    let mut cursor = SliceCursor::new();
    cursor.add_slice(MemBuf::alloc(0));
    assert_eq!(cursor.size(), 0);
    assert!(!cursor.char_available());
}

#[test]
fn reads_cross_slice_boundaries() {
    let mut cursor = cursor_over(&[&[1, 2], &[3], &[4, 5]]);
    let mut seen = Vec::new();
    while cursor.char_available() {
        seen.push(cursor.get_char());
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(cursor.position(), 5);
    assert_eq!(cursor.remaining(), 0);
}

#[test]
#[should_panic]
fn reading_past_the_end_panics() {
    let mut cursor = cursor_over(&[&[1]]);
    cursor.get_char();
    cursor.get_char();
}

#[test]
fn reset_rewinds_without_dropping_slices() {
    let mut cursor = cursor_over(&[&[1, 2], &[3]]);
    cursor.get_char();
    cursor.get_char();
    cursor.reset(false);
    assert_eq!(cursor.size(), 3);
    assert_eq!(cursor.position(), 0);
    assert_eq!(cursor.get_char(), 1);
}

#[test]
fn reset_can_drop_all_slices() {
    let mut cursor = cursor_over(&[&[1, 2], &[3]]);
    cursor.reset(true);
    assert_eq!(cursor.size(), 0);
    assert!(!cursor.char_available());
}

#[test]
fn appending_after_exhaustion_makes_bytes_available_again() {
    let mut cursor = SliceCursor::new();
    cursor.add_slice(MemBuf::from_slice(&[7]));
    assert_eq!(cursor.get_char(), 7);
    assert!(!cursor.char_available());

    cursor.reset(true);
    cursor.add_slice(MemBuf::from_slice(&[8, 9]));
    assert_eq!(cursor.get_char(), 8);
    assert_eq!(cursor.get_char(), 9);
}

#[test]
fn copy_extracts_across_boundaries() {
    let cursor = cursor_over(&[&[1, 2], &[3], &[4, 5, 6]]);
    let mut dest = [0u8; 4];
    cursor.copy(&mut dest, 1);
    assert_eq!(dest, [2, 3, 4, 5]);
}

#[test]
fn copy_does_not_move_the_read_position() {
    let mut cursor = cursor_over(&[&[1, 2, 3]]);
    let mut dest = [0u8; 2];
    cursor.copy(&mut dest, 1);
    assert_eq!(cursor.position(), 0);
    assert_eq!(cursor.get_char(), 1);
}

#[test]
#[should_panic]
fn copy_past_the_end_panics() {
    let cursor = cursor_over(&[&[1, 2]]);
    let mut dest = [0u8; 3];
    cursor.copy(&mut dest, 0);
}

// Any slicing of a byte string reads back as the original, both
// sequentially and through random-access copies.
proptest! {
    #[test]
    fn sliced_input_reads_back_verbatim(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        cuts in proptest::collection::vec(any::<Index>(), 0..8),
    ) {
        let mut bounds: Vec<usize> = cuts.iter().map(|i| i.index(data.len())).collect();
        bounds.push(0);
        bounds.push(data.len());
        bounds.sort_unstable();

        let mut cursor = SliceCursor::new();
        for pair in bounds.windows(2) {
            cursor.add_slice(MemBuf::from_slice(&data[pair[0]..pair[1]]));
        }
        prop_assert_eq!(cursor.size(), data.len());

        let mut sequential = Vec::with_capacity(data.len());
        while cursor.char_available() {
            sequential.push(cursor.get_char());
        }
        prop_assert_eq!(&sequential, &data);
    }

    #[test]
    fn copy_matches_the_concatenation(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        cuts in proptest::collection::vec(any::<Index>(), 0..8),
        start in any::<Index>(),
        len in any::<Index>(),
    ) {
        let mut bounds: Vec<usize> = cuts.iter().map(|i| i.index(data.len())).collect();
        bounds.push(0);
        bounds.push(data.len());
        bounds.sort_unstable();

        let mut cursor = SliceCursor::new();
        for pair in bounds.windows(2) {
            cursor.add_slice(MemBuf::from_slice(&data[pair[0]..pair[1]]));
        }

        let start = start.index(data.len());
        let len = len.index(data.len() - start + 1);
        let mut dest = vec![0u8; len];
        cursor.copy(&mut dest, start);
        prop_assert_eq!(dest.as_slice(), &data[start..start + len]);
    }
}
