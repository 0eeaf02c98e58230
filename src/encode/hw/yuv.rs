use crate::encode::hw::decoder::I420Frame;
use crate::foundation::error::{LapseError, LapseResult};

/// Repack planar I420 into NV12: the Y plane as-is, then U and V interleaved.
pub fn i420_to_nv12(src: &I420Frame, dst: &mut [u8]) -> LapseResult<()> {
    let y_len = src.y().len();
    let c_len = src.u().len();
    if dst.len() < y_len + 2 * c_len {
        return Err(LapseError::encoder(format!(
            "nv12 buffer too small: {} < {}",
            dst.len(),
            y_len + 2 * c_len
        )));
    }

    let (y_dst, uv_dst) = dst.split_at_mut(y_len);
    y_dst.copy_from_slice(src.y());
    for ((pair, &u), &v) in uv_dst
        .chunks_exact_mut(2)
        .zip(src.u().iter())
        .zip(src.v().iter())
    {
        pair[0] = u;
        pair[1] = v;
    }
    Ok(())
}
