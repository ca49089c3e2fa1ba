//! Frame-level reading, corruption recovery and window bounds
mod common;

use common::{con0, frame, gga, ticks};
use ekraw::parser::cursor::RawCursor;
use ekraw::parser::datagram::{next_datagram, resync_after_corrupt};
use ekraw::Error;
use std::io::Cursor;

fn small_stream() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(frame(
        b"CON0",
        ticks(1_000),
        &con0("survey", &[("WBT 5426 ES200-7C", 200_000.0)]),
    ));
    bytes.extend(frame(b"NME0", ticks(1_001), &gga()));
    bytes.extend(frame(b"NME0", ticks(1_002), &gga()));
    bytes
}

#[test]
fn reads_frames_in_order() {
    let bytes = small_stream();
    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();

    let first = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(first.type_tag, "CON0");
    assert_eq!(first.offset, 0);
    assert_eq!(first.ticks, ticks(1_000));

    let second = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(second.type_tag, "NME0");
    assert_eq!(second.timestamp().unix_timestamp(), 1_001);

    let third = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(third.ticks, ticks(1_002));

    assert!(next_datagram(&mut cursor).unwrap().is_none());
}

#[test]
fn trailing_length_mismatch_is_corrupt_and_recoverable() {
    let mut bytes = small_stream();
    // break the trailing length of the second frame
    let first_len = bytes.len() - 2 * (12 + gga().len() + 8);
    let second_end = first_len + 12 + gga().len() + 8;
    bytes[second_end - 4] ^= 0xff;

    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    let err = next_datagram(&mut cursor).unwrap_err();
    let offset = match err {
        Error::CorruptFrame { offset, .. } => offset,
        other => panic!("unexpected error {other}"),
    };
    assert_eq!(offset, first_len as u64);

    resync_after_corrupt(&mut cursor, offset).unwrap();
    let recovered = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(recovered.type_tag, "NME0");
    assert_eq!(recovered.ticks, ticks(1_002));
}

#[test]
fn leading_length_corruption_is_corrupt_and_recoverable() {
    let mut bytes = small_stream();
    // overwrite the second frame's leading length with a value that
    // reaches far past the end of the stream
    let second_start = bytes.len() - 2 * (12 + gga().len() + 8);
    bytes[second_start..second_start + 4].copy_from_slice(&0x7f00_0001u32.to_le_bytes());

    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    let err = next_datagram(&mut cursor).unwrap_err();
    let offset = match err {
        Error::CorruptFrame { offset, lead, .. } => {
            assert_eq!(lead, 0x7f00_0001);
            offset
        }
        other => panic!("unexpected error {other}"),
    };
    assert_eq!(offset, second_start as u64);

    // the frame after the corruption is not lost
    resync_after_corrupt(&mut cursor, offset).unwrap();
    let recovered = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(recovered.type_tag, "NME0");
    assert_eq!(recovered.ticks, ticks(1_002));
}

#[test]
fn resync_skips_leading_garbage() {
    let mut bytes = vec![0x55u8; 37];
    bytes.extend(frame(b"NME0", ticks(5), &gga()));

    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    let aligned = cursor.resync().unwrap();
    assert_eq!(aligned, 37);
    let dg = next_datagram(&mut cursor).unwrap().unwrap();
    assert_eq!(dg.type_tag, "NME0");
}

#[test]
fn resync_without_any_tag_fails() {
    let bytes = vec![0u8; 300];
    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    assert!(matches!(cursor.resync(), Err(Error::StartByteNotFound)));
}

#[test]
fn truncated_tail_is_flagged_corrupt() {
    let mut bytes = small_stream();
    bytes.truncate(bytes.len() - 10);
    let mut cursor = RawCursor::new(Cursor::new(bytes)).unwrap();
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    // the last frame's length reaches past the end of the stream
    let err = next_datagram(&mut cursor).unwrap_err();
    let offset = match err {
        Error::CorruptFrame { offset, .. } => offset,
        other => panic!("unexpected error {other}"),
    };
    // nothing left to recover to
    assert!(matches!(
        resync_after_corrupt(&mut cursor, offset),
        Err(Error::StartByteNotFound)
    ));
}

#[test]
fn window_bound_cuts_before_a_partial_frame() {
    let bytes = small_stream();
    let last_frame_len = (12 + gga().len() + 8) as u64;
    let end = bytes.len() as u64 - last_frame_len + 5;
    let mut cursor = RawCursor::bounded(Cursor::new(bytes), 0, Some(end)).unwrap();
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    assert!(next_datagram(&mut cursor).unwrap().is_some());
    assert!(next_datagram(&mut cursor).unwrap().is_none());
}
