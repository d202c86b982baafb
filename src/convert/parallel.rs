//! Splitting the NV12 chroma interleave of large frames across a small
//! rayon pool.

use std::sync::OnceLock;

/// Chunk boundaries fall on multiples of this many U/V pairs, so every
/// worker writes whole 512-byte runs of the chroma plane.
const CHUNK_PAIR_ALIGNMENT: usize = 256;

/// Interleaving is memory bound; more workers than this only contend.
const MAX_COPY_WORKERS: usize = 4;

/// Builds the pool ahead of the first overlay frame.
pub(crate) fn warmup_pool() {
    with_copy_pool(|| {});
}

/// U/V pairs handed to each worker, or `None` when the frame is small
/// enough to interleave on the calling thread.
pub(crate) fn chroma_chunk_pairs(
    pairs: usize,
    min_pairs: usize,
    min_chunk_pairs: usize,
) -> Option<usize> {
    let workers = copy_workers();
    if workers <= 1 || pairs < min_pairs.max(min_chunk_pairs.saturating_mul(workers)) {
        return None;
    }
    let chunk = pairs / workers;
    let chunk = chunk - chunk % CHUNK_PAIR_ALIGNMENT;
    (chunk > 0 && chunk >= min_chunk_pairs && pairs.div_ceil(chunk) >= 2).then_some(chunk)
}

fn copy_workers() -> usize {
    static WORKERS: OnceLock<usize> = OnceLock::new();
    *WORKERS.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_COPY_WORKERS)
    })
}

/// Runs `job` inside the copy pool, or inline when there is no second
/// core to use.
pub(crate) fn with_copy_pool<F>(job: F)
where
    F: FnOnce() + Send,
{
    static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();
    let pool = POOL.get_or_init(|| {
        let workers = copy_workers();
        if workers <= 1 {
            return None;
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("rkdisp-copy-{index}"))
            .build()
            .inspect_err(|err| log::warn!("chroma copy pool unavailable: {err}"))
            .ok()
    });
    match pool {
        Some(pool) => pool.install(job),
        None => job(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hd_chroma_splits_on_aligned_boundaries() {
        let pairs = 960 * 544;
        let Some(chunk) = chroma_chunk_pairs(pairs, 131_072, 32_768) else {
            assert!(copy_workers() < 2);
            return;
        };
        assert_eq!(chunk % CHUNK_PAIR_ALIGNMENT, 0);
        assert!(chunk >= 32_768);
        assert!(pairs.div_ceil(chunk) >= 2);
    }

    #[test]
    fn small_frames_stay_on_the_caller() {
        assert_eq!(chroma_chunk_pairs(160 * 120, 131_072, 32_768), None);
        assert_eq!(chroma_chunk_pairs(100, 0, 0), None);
    }

    #[test]
    fn worker_count_is_capped() {
        assert!((1..=MAX_COPY_WORKERS).contains(&copy_workers()));
    }
}
