//! Truncated-tail recovery for concatenated compressed frames.

use std::io::Write;

use proptest::prelude::*;
use wfgraph_fetch::{decompress, DecodeError};
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

// ============================================================================
// Helpers
// ============================================================================

/// Legacy `.lzma` frame, the format the index ships in.
fn lzma_frame(plain: &[u8]) -> Vec<u8> {
    let options = LzmaOptions::new_preset(1).unwrap();
    let stream = Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(plain).unwrap();
    encoder.finish().unwrap()
}

/// `.xz` frame; the auto decoder accepts both container formats.
fn xz_frame(plain: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 1);
    encoder.write_all(plain).unwrap();
    encoder.finish().unwrap()
}

const FIRST: &[u8] = b"ExportResources_en.json!abc\nExportWeapons_en.json!def\n";
const SECOND: &[u8] = b"ExportRecipes_en.json!0123456789abcdef\nExportUpgrades_en.json!fedcba\n";

fn expected() -> Vec<u8> {
    [FIRST, SECOND].concat()
}

// ============================================================================
// Deterministic cases
// ============================================================================

#[test]
fn two_frames_decode_to_concatenation() {
    let buffer = [lzma_frame(FIRST), lzma_frame(SECOND)].concat();
    assert_eq!(decompress(&buffer).unwrap(), expected());
}

#[test]
fn mixed_container_formats_decode() {
    let buffer = [xz_frame(FIRST), lzma_frame(SECOND)].concat();
    assert_eq!(decompress(&buffer).unwrap(), expected());
}

#[test]
fn every_garbage_length_below_frame_size_is_dropped() {
    let second = lzma_frame(SECOND);
    let clean = [lzma_frame(FIRST), second.clone()].concat();

    for n in 1..second.len() {
        let mut buffer = clean.clone();
        buffer.extend(std::iter::repeat(0xFF).take(n));
        assert_eq!(decompress(&buffer).unwrap(), expected(), "garbage length {n}");
    }
}

#[test]
fn every_partial_third_frame_is_dropped() {
    let third = lzma_frame(b"ExportWarframes_en.json!999\n");
    let clean = [lzma_frame(FIRST), lzma_frame(SECOND)].concat();

    for n in 1..third.len() {
        let mut buffer = clean.clone();
        buffer.extend_from_slice(&third[..n]);
        assert_eq!(decompress(&buffer).unwrap(), expected(), "partial length {n}");
    }
}

#[test]
fn empty_buffer_is_empty_output() {
    assert!(decompress(&[]).unwrap().is_empty());
}

#[test]
fn non_stream_is_a_hard_failure() {
    let err = decompress(b"this is plain text, not lzma").unwrap_err();
    assert!(matches!(err, DecodeError::Invalid(_)));
}

// ============================================================================
// Property
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_trailing_garbage_never_changes_the_output(
        seed in prop::collection::vec(any::<u8>(), 1..512),
        cut in any::<prop::sample::Index>(),
    ) {
        let second = lzma_frame(SECOND);
        let n = 1 + cut.index(second.len() - 1);
        let garbage: Vec<u8> = seed.iter().cycle().take(n).copied().collect();

        let mut buffer = [lzma_frame(FIRST), second].concat();
        buffer.extend_from_slice(&garbage);

        prop_assert_eq!(decompress(&buffer).unwrap(), expected());
    }
}
