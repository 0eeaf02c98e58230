use crate::capture::jpeg::{JpegInfo, read_info};
use crate::foundation::config::Flip;
use crate::foundation::error::{LapseError, LapseResult};

/// Planar 4:2:0 picture: full-resolution Y followed by quarter-size U and V.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct I420Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl I420Frame {
    /// Zeroed frame. `width` and `height` are expected to be even.
    pub fn new(width: u32, height: u32) -> Self {
        let y = (width as usize) * (height as usize);
        Self {
            width,
            height,
            data: vec![0u8; y + 2 * (y / 4)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn y_len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    fn c_len(&self) -> usize {
        self.y_len() / 4
    }

    pub fn y(&self) -> &[u8] {
        &self.data[..self.y_len()]
    }

    pub fn u(&self) -> &[u8] {
        let (y, c) = (self.y_len(), self.c_len());
        &self.data[y..y + c]
    }

    pub fn v(&self) -> &[u8] {
        let (y, c) = (self.y_len(), self.c_len());
        &self.data[y + c..y + 2 * c]
    }

    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let (y, c) = (self.y_len(), self.c_len());
        let (y_plane, rest) = self.data.split_at_mut(y);
        let (u_plane, rest) = rest.split_at_mut(c);
        (y_plane, u_plane, &mut rest[..c])
    }

    /// Mirror all three planes in place.
    pub fn apply_flip(&mut self, flip: Flip) {
        if !flip.horizontal && !flip.vertical {
            return;
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let (y, u, v) = self.planes_mut();
        flip_plane(y, w, h, flip);
        flip_plane(u, w / 2, h / 2, flip);
        flip_plane(v, w / 2, h / 2, flip);
    }
}

fn flip_plane(plane: &mut [u8], width: usize, height: usize, flip: Flip) {
    if width == 0 || height == 0 {
        return;
    }
    if flip.horizontal {
        for row in plane.chunks_exact_mut(width) {
            row.reverse();
        }
    }
    if flip.vertical {
        for top in 0..height / 2 {
            let bottom = height - 1 - top;
            let (head, tail) = plane.split_at_mut(bottom * width);
            head[top * width..(top + 1) * width].swap_with_slice(&mut tail[..width]);
        }
    }
}

/// JPEG codec capability used by the hardware pipeline.
pub trait JpegDecoder: Send {
    fn read_header(&mut self, jpeg: &[u8]) -> LapseResult<JpegInfo>;

    /// Decode into `dst`, whose size must match the image.
    fn decode_i420(&mut self, jpeg: &[u8], dst: &mut I420Frame) -> LapseResult<()>;
}

/// Creates a decoder handle per encode session.
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> LapseResult<Box<dyn JpegDecoder>>;
}

/// Software JPEG decoder on top of the `image` crate, converting to BT.601 full-range I420.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageJpegDecoder;

impl DecoderFactory for ImageJpegDecoder {
    fn create(&self) -> LapseResult<Box<dyn JpegDecoder>> {
        Ok(Box::new(ImageJpegDecoder))
    }
}

impl JpegDecoder for ImageJpegDecoder {
    fn read_header(&mut self, jpeg: &[u8]) -> LapseResult<JpegInfo> {
        read_info(jpeg)
    }

    fn decode_i420(&mut self, jpeg: &[u8], dst: &mut I420Frame) -> LapseResult<()> {
        let img = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
            .map_err(|e| LapseError::decode(format!("jpeg decode failed: {e}")))?
            .to_rgb8();
        let (w, h) = img.dimensions();
        if (w, h) != (dst.width(), dst.height()) {
            return Err(LapseError::GeometryMismatch {
                got_width: w,
                got_height: h,
                width: dst.width(),
                height: dst.height(),
            });
        }
        rgb_to_i420(img.as_raw(), w as usize, h as usize, dst);
        Ok(())
    }
}

fn rgb_to_i420(rgb: &[u8], width: usize, height: usize, dst: &mut I420Frame) {
    let (y_plane, u_plane, v_plane) = dst.planes_mut();
    let px = |x: usize, y: usize| {
        let i = (y * width + x) * 3;
        (rgb[i] as i32, rgb[i + 1] as i32, rgb[i + 2] as i32)
    };

    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = px(x, y);
            y_plane[y * width + x] = ((77 * r + 150 * g + 29 * b + 128) >> 8).clamp(0, 255) as u8;
        }
    }

    let cw = width / 2;
    for cy in 0..height / 2 {
        for cx in 0..cw {
            let (mut r, mut g, mut b) = (0, 0, 0);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (pr, pg, pb) = px(cx * 2 + dx, cy * 2 + dy);
                r += pr;
                g += pg;
                b += pb;
            }
            let (r, g, b) = ((r + 2) / 4, (g + 2) / 4, (b + 2) / 4);
            let u = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
            let v = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
            u_plane[cy * cw + cx] = u.clamp(0, 255) as u8;
            v_plane[cy * cw + cx] = v.clamp(0, 255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/encode/decoder.rs"]
mod tests;
