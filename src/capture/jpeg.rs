use crate::foundation::error::{LapseError, LapseResult};

/// Largest JPEG accepted from the frame source or read back from a staged file.
pub const MAX_JPEG_BYTES: usize = 512 * 1024;
/// Smallest buffer that can plausibly hold SOI, headers, a scan and EOI.
pub const MIN_JPEG_BYTES: usize = 100;

const MARKER: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

/// Chroma layout declared by the frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaSubsampling {
    Yuv420,
    Yuv422,
    Yuv444,
    Gray,
    Other,
}

impl ChromaSubsampling {
    /// Layouts the decoder can bring down to 4:2:0.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Yuv420 | Self::Yuv422 | Self::Yuv444)
    }
}

/// Geometry parsed from the start-of-frame segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub subsampling: ChromaSubsampling,
}

/// Structural check over the whole buffer.
///
/// Requires SOI at offset 0, EOI in the final two bytes, and no other SOI or EOI marker anywhere.
/// A second SOI means two frames were concatenated; an early EOI means the frame was cut short.
pub fn validate_jpeg(data: &[u8]) -> LapseResult<()> {
    let len = data.len();
    if len < MIN_JPEG_BYTES {
        return Err(LapseError::corrupt(format!("too small ({len} bytes)")));
    }
    if data[0] != MARKER || data[1] != SOI {
        return Err(LapseError::corrupt(format!(
            "bad SOI (0x{:02x}{:02x})",
            data[0], data[1]
        )));
    }
    if data[len - 2] != MARKER || data[len - 1] != EOI {
        return Err(LapseError::corrupt(format!(
            "bad EOI at end (0x{:02x}{:02x})",
            data[len - 2],
            data[len - 1]
        )));
    }

    for (i, pair) in data.windows(2).enumerate() {
        if pair[0] != MARKER {
            continue;
        }
        match pair[1] {
            SOI if i != 0 => {
                return Err(LapseError::corrupt(format!("extra SOI at offset {i}")));
            }
            EOI if i != len - 2 => {
                return Err(LapseError::corrupt(format!(
                    "premature EOI at offset {i} (size {len})"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Walk the header segments up to the first scan and parse the SOF segment.
pub fn read_info(data: &[u8]) -> LapseResult<JpegInfo> {
    if data.len() < 4 || data[0] != MARKER || data[1] != SOI {
        return Err(LapseError::corrupt("missing SOI"));
    }

    let mut i = 2usize;
    while i + 1 < data.len() {
        if data[i] != MARKER {
            return Err(LapseError::corrupt(format!(
                "expected marker at offset {i}"
            )));
        }
        let marker = data[i + 1];
        match marker {
            // fill byte before a marker
            MARKER => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            EOI | SOS => break,
            _ => {}
        }

        let seg_len = be16(data, i + 2)? as usize;
        if seg_len < 2 || i + 2 + seg_len > data.len() {
            return Err(LapseError::corrupt(format!(
                "segment 0x{marker:02x} overruns buffer"
            )));
        }
        if is_sof(marker) {
            return parse_sof(&data[i + 4..i + 2 + seg_len]);
        }
        i += 2 + seg_len;
    }
    Err(LapseError::corrupt("no start-of-frame segment"))
}

fn is_sof(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn be16(data: &[u8], at: usize) -> LapseResult<u16> {
    match data.get(at..at + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(LapseError::corrupt("truncated segment length")),
    }
}

fn parse_sof(seg: &[u8]) -> LapseResult<JpegInfo> {
    // precision(1) height(2) width(2) components(1) then 3 bytes per component
    if seg.len() < 6 {
        return Err(LapseError::corrupt("short SOF segment"));
    }
    let height = u32::from(u16::from_be_bytes([seg[1], seg[2]]));
    let width = u32::from(u16::from_be_bytes([seg[3], seg[4]]));
    let ncomp = seg[5] as usize;
    if width == 0 || height == 0 {
        return Err(LapseError::corrupt("zero frame dimension"));
    }
    if seg.len() < 6 + ncomp * 3 {
        return Err(LapseError::corrupt("short SOF component table"));
    }

    let factors = |c: usize| {
        let s = seg[6 + c * 3 + 1];
        (s >> 4, s & 0x0F)
    };
    let subsampling = match ncomp {
        1 => ChromaSubsampling::Gray,
        3 => {
            let (yh, yv) = factors(0);
            let (cbh, cbv) = factors(1);
            let (crh, crv) = factors(2);
            if (cbh, cbv) != (crh, crv) || cbh == 0 || cbv == 0 {
                ChromaSubsampling::Other
            } else {
                match (yh / cbh, yv / cbv, yh % cbh, yv % cbv) {
                    (2, 2, 0, 0) => ChromaSubsampling::Yuv420,
                    (2, 1, 0, 0) => ChromaSubsampling::Yuv422,
                    (1, 1, 0, 0) => ChromaSubsampling::Yuv444,
                    _ => ChromaSubsampling::Other,
                }
            }
        }
        _ => ChromaSubsampling::Other,
    };

    Ok(JpegInfo {
        width,
        height,
        subsampling,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/capture/jpeg.rs"]
mod tests;
