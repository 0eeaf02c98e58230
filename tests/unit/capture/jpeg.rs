use super::*;
use crate::test_support::jpeg_fixture;

fn padded(body: &[u8]) -> Vec<u8> {
    // SOI, body, filler, EOI; long enough to clear the minimum size
    let mut v = vec![0xFF, 0xD8];
    v.extend_from_slice(body);
    v.resize(MIN_JPEG_BYTES + 16, 0x11);
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

#[test]
fn encoder_output_validates() {
    let jpeg = jpeg_fixture(32, 16, 3);
    validate_jpeg(&jpeg).unwrap();
    let info = read_info(&jpeg).unwrap();
    assert_eq!((info.width, info.height), (32, 16));
    assert!(info.subsampling.is_supported());
}

#[test]
fn rejects_second_soi_anywhere() {
    let base = padded(&[]);
    for pos in [2usize, 10, 50, base.len() - 4] {
        let mut v = base.clone();
        v[pos] = 0xFF;
        v[pos + 1] = 0xD8;
        let err = validate_jpeg(&v).unwrap_err();
        assert!(matches!(err, LapseError::CorruptFrame(_)), "pos {pos}");
    }
}

#[test]
fn rejects_early_eoi_anywhere() {
    let base = padded(&[]);
    for pos in [2usize, 33, base.len() - 4] {
        let mut v = base.clone();
        v[pos] = 0xFF;
        v[pos + 1] = 0xD9;
        assert!(validate_jpeg(&v).is_err(), "pos {pos}");
    }
}

#[test]
fn rejects_real_frame_with_appended_frame() {
    let mut a = jpeg_fixture(16, 16, 1);
    a.extend_from_slice(&jpeg_fixture(16, 16, 2));
    assert!(validate_jpeg(&a).is_err());
}

#[test]
fn rejects_bad_ends_and_tiny_buffers() {
    assert!(validate_jpeg(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());

    let mut no_soi = padded(&[]);
    no_soi[1] = 0x00;
    assert!(validate_jpeg(&no_soi).is_err());

    let mut truncated = jpeg_fixture(16, 16, 0);
    truncated.truncate(truncated.len() - 1);
    assert!(validate_jpeg(&truncated).is_err());
}

#[test]
fn sof_parses_420_layout() {
    // SOF0: len 17, precision 8, 48x32, 3 components: Y 2x2, Cb 1x1, Cr 1x1
    let sof = [
        0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x20, 0x00, 0x30, 0x03, 0x01, 0x22, 0x00, 0x02,
        0x11, 0x01, 0x03, 0x11, 0x01,
    ];
    let v = padded(&sof);
    let info = read_info(&v).unwrap();
    assert_eq!(info.width, 48);
    assert_eq!(info.height, 32);
    assert_eq!(info.subsampling, ChromaSubsampling::Yuv420);
}

#[test]
fn sof_missing_is_an_error() {
    let v = padded(&[0xFF, 0xDA, 0x00, 0x02]);
    assert!(read_info(&v).is_err());
}
