mod parallel;
mod scalar;

use parallel::{chroma_chunk_pairs, with_copy_pool};
use rayon::prelude::*;

use crate::error::{AccelError, AccelResult};
use crate::surface::ImageFormat;

const INTERLEAVE_PARALLEL_MIN_PAIRS: usize = 131_072;
const INTERLEAVE_PARALLEL_MIN_CHUNK_PAIRS: usize = 32_768;

/// Starts the chroma copy workers. Idempotent.
pub fn warmup() {
    parallel::warmup_pool();
}

/// Copies a planar YUV 4:2:0 frame (`I420` or `YV12`, as laid out by
/// [`SurfaceLayout`](crate::surface::SurfaceLayout)) into the NV12 order
/// the overlay scans out: the luma plane unchanged, then U and V
/// interleaved byte by byte.
///
/// `src.len()` is the frame size; luma takes the first two thirds and each
/// chroma plane one sixth.
pub fn copy_planar_to_nv12(dst: &mut [u8], src: &[u8], format: ImageFormat) -> AccelResult<()> {
    let frame_len = src.len();
    let luma_len = frame_len * 2 / 3;
    let plane_len = frame_len / 6;
    let (u_start, v_start) = match format {
        ImageFormat::I420 => (frame_len * 4 / 6, frame_len * 5 / 6),
        ImageFormat::Yv12 => (frame_len * 5 / 6, frame_len * 4 / 6),
    };

    let u = plane(src, u_start, plane_len)?;
    let v = plane(src, v_start, plane_len)?;
    let luma = plane(src, 0, luma_len)?;

    let dst = dst
        .get_mut(..luma_len + plane_len * 2)
        .ok_or(AccelError::BufferOverflow)?;
    let (dst_luma, dst_chroma) = dst.split_at_mut(luma_len);
    dst_luma.copy_from_slice(luma);
    interleave_chroma(dst_chroma, u, v);
    Ok(())
}

fn plane(src: &[u8], start: usize, len: usize) -> AccelResult<&[u8]> {
    src.get(start..start + len).ok_or(AccelError::BufferOverflow)
}

fn interleave_chroma(dst: &mut [u8], u: &[u8], v: &[u8]) {
    let pairs = u.len().min(v.len());
    let Some(chunk_pairs) = chroma_chunk_pairs(
        pairs,
        INTERLEAVE_PARALLEL_MIN_PAIRS,
        INTERLEAVE_PARALLEL_MIN_CHUNK_PAIRS,
    ) else {
        scalar::interleave_u8(dst, u, v);
        return;
    };

    with_copy_pool(|| {
        dst.par_chunks_mut(chunk_pairs * 2)
            .zip(u.par_chunks(chunk_pairs))
            .zip(v.par_chunks(chunk_pairs))
            .for_each(|((dst, u), v)| scalar::interleave_u8(dst, u, v));
    });
}
