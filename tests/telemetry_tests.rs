//! Unit tests for the status line format and its block padding.

use gazpar_probe::telemetry::{
    padded_len, Reading, TelemetryError, BLOCK_SIZE, MAX_TEXT_LEN, MESSAGE_CAPACITY,
};

// ============================================================================
// Tests for text
// ============================================================================

#[test]
fn test_text_field_order() {
    let text = Reading::new(7, 3300, 42).text().unwrap();
    assert_eq!(text.as_str(), "d:7;v:3300;p:42;");
}

#[test]
fn test_text_at_limit() {
    let text = Reading::new(12_345_678, 3300, 4_000_000_000).text().unwrap();
    assert_eq!(text.as_str(), "d:12345678;v:3300;p:4000000000;");
    assert_eq!(text.len(), MAX_TEXT_LEN);
}

#[test]
fn test_text_one_over_limit_rejected() {
    assert_eq!(
        Reading::new(123_456_789, 3300, 4_000_000_000).text(),
        Err(TelemetryError::TooLong { len: 32, max: 31 })
    );
}

#[test]
fn test_text_widest_fields_rejected() {
    assert_eq!(
        Reading::new(u32::MAX, u32::MAX, u32::MAX).text(),
        Err(TelemetryError::TooLong { len: 39, max: 31 })
    );
}

// ============================================================================
// Tests for encode
// ============================================================================

#[test]
fn test_encode_pads_to_two_blocks() {
    let mut out = [0xAAu8; MESSAGE_CAPACITY];
    let len = Reading::new(7, 3300, 42).encode(&mut out).unwrap();

    // 16 text bytes plus the terminator spill into a second block
    assert_eq!(len, 32);
    assert_eq!(&out[..16], b"d:7;v:3300;p:42;");
    assert!(out[16..].iter().all(|&b| b == 0));
}

#[test]
fn test_encode_single_block() {
    let mut out = [0xAAu8; MESSAGE_CAPACITY];
    let len = Reading::new(1, 0, 0).encode(&mut out).unwrap();

    assert_eq!(len, 16);
    assert_eq!(&out[..12], b"d:1;v:0;p:0;");
    assert!(out[12..].iter().all(|&b| b == 0));
}

#[test]
fn test_encode_at_limit_terminator_is_last_byte() {
    let mut out = [0xAAu8; MESSAGE_CAPACITY];
    let len = Reading::new(12_345_678, 3300, 4_000_000_000)
        .encode(&mut out)
        .unwrap();

    assert_eq!(len, MESSAGE_CAPACITY);
    assert_eq!(&out[..31], b"d:12345678;v:3300;p:4000000000;");
    assert_eq!(out[31], 0);
}

#[test]
fn test_encode_too_long_leaves_buffer_untouched() {
    let mut out = [0xAAu8; MESSAGE_CAPACITY];
    let result = Reading::new(123_456_789, 3300, 4_000_000_000).encode(&mut out);

    assert!(matches!(result, Err(TelemetryError::TooLong { .. })));
    assert!(out.iter().all(|&b| b == 0xAA));
}

#[test]
fn test_padded_len_rounds_to_block() {
    assert_eq!(padded_len(1), BLOCK_SIZE);
    assert_eq!(padded_len(16), 16);
    assert_eq!(padded_len(17), 32);
    assert_eq!(padded_len(32), 32);
}
