//! Fan-out-and-join loop primitives.
//!
//! Thin wrappers over the rayon worker pool. Every call blocks the caller
//! until all spawned work completes; there is no cancellation and no
//! ordering guarantee across indices. Callbacks must write only to disjoint
//! state per index -- no synchronization is provided.
//!
//! The 2-D/3-D variants compose the 1-D primitive: the last axis is the
//! parallel fan-out axis and X is always the innermost serial loop. Range
//! variants hand each task a `[begin, end)` chunk instead of single indices
//! so per-call setup (scratch rows, stencil index buffers) can be amortized.

use rayon::prelude::*;

/// Backend selection for the fan-out primitives.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ExecutionPolicy {
    /// Plain loop on the calling thread, preserving index order.
    Serial,
    /// Fan out across the worker pool; no ordering guarantee.
    #[default]
    Parallel,
}

/// Number of chunks used by the range variants.
fn chunk_count() -> usize {
    rayon::current_num_threads().max(1)
}

/// Calls `f(i)` for every `i` in `[begin, end)` across the worker pool.
pub fn parallel_for<F>(begin: usize, end: usize, f: F)
where
    F: Fn(usize) + Sync + Send,
{
    parallel_for_with_policy(begin, end, f, ExecutionPolicy::Parallel);
}

/// `parallel_for` with an explicit execution policy.
pub fn parallel_for_with_policy<F>(begin: usize, end: usize, f: F, policy: ExecutionPolicy)
where
    F: Fn(usize) + Sync + Send,
{
    if begin >= end {
        return;
    }
    match policy {
        ExecutionPolicy::Serial => {
            for i in begin..end {
                f(i);
            }
        }
        ExecutionPolicy::Parallel => {
            (begin..end).into_par_iter().for_each(f);
        }
    }
}

/// Calls `f(chunk_begin, chunk_end)` over worker-count-sized chunks of
/// `[begin, end)`.
pub fn parallel_range_for<F>(begin: usize, end: usize, f: F)
where
    F: Fn(usize, usize) + Sync + Send,
{
    parallel_range_for_with_policy(begin, end, f, ExecutionPolicy::Parallel);
}

/// `parallel_range_for` with an explicit execution policy.
pub fn parallel_range_for_with_policy<F>(begin: usize, end: usize, f: F, policy: ExecutionPolicy)
where
    F: Fn(usize, usize) + Sync + Send,
{
    if begin >= end {
        return;
    }
    match policy {
        ExecutionPolicy::Serial => f(begin, end),
        ExecutionPolicy::Parallel => {
            let len = end - begin;
            let chunks = chunk_count().min(len);
            let chunk_len = len.div_ceil(chunks);
            (0..chunks).into_par_iter().for_each(|c| {
                let lo = begin + c * chunk_len;
                let hi = (lo + chunk_len).min(end);
                if lo < hi {
                    f(lo, hi);
                }
            });
        }
    }
}

/// 2-D nested loop: X innermost, Y fans out.
pub fn parallel_for2<F>(
    begin_x: usize,
    end_x: usize,
    begin_y: usize,
    end_y: usize,
    f: F,
) where
    F: Fn(usize, usize) + Sync + Send,
{
    parallel_for(begin_y, end_y, |j| {
        for i in begin_x..end_x {
            f(i, j);
        }
    });
}

/// 3-D nested loop: X innermost, Z fans out.
pub fn parallel_for3<F>(
    begin_x: usize,
    end_x: usize,
    begin_y: usize,
    end_y: usize,
    begin_z: usize,
    end_z: usize,
    f: F,
) where
    F: Fn(usize, usize, usize) + Sync + Send,
{
    parallel_for(begin_z, end_z, |k| {
        for j in begin_y..end_y {
            for i in begin_x..end_x {
                f(i, j, k);
            }
        }
    });
}

/// 2-D range loop: each task receives the full X range and a chunk of Y.
pub fn parallel_range_for2<F>(
    begin_x: usize,
    end_x: usize,
    begin_y: usize,
    end_y: usize,
    f: F,
) where
    F: Fn(usize, usize, usize, usize) + Sync + Send,
{
    parallel_range_for(begin_y, end_y, |j_begin, j_end| {
        f(begin_x, end_x, j_begin, j_end);
    });
}

/// 3-D range loop: each task receives the full X/Y ranges and a chunk of Z.
pub fn parallel_range_for3<F>(
    begin_x: usize,
    end_x: usize,
    begin_y: usize,
    end_y: usize,
    begin_z: usize,
    end_z: usize,
    f: F,
) where
    F: Fn(usize, usize, usize, usize, usize, usize) + Sync + Send,
{
    parallel_range_for(begin_z, end_z, |k_begin, k_end| {
        f(begin_x, end_x, begin_y, end_y, k_begin, k_end);
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_parallel_for_visits_every_index() {
        let hits: Vec<AtomicUsize> = (0..100).map(|_| AtomicUsize::new(0)).collect();
        parallel_for(0, 100, |i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_serial_policy_preserves_order() {
        let seen = std::sync::Mutex::new(Vec::new());
        parallel_for_with_policy(
            3,
            8,
            |i| {
                seen.lock().unwrap().push(i);
            },
            ExecutionPolicy::Serial,
        );
        assert_eq!(*seen.lock().unwrap(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_range_chunks_cover_without_overlap() {
        let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
        parallel_range_for(0, 1000, |lo, hi| {
            for i in lo..hi {
                hits[i].fetch_add(1, Ordering::Relaxed);
            }
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_empty_range_is_noop() {
        parallel_for(5, 5, |_| panic!("must not be called"));
        parallel_range_for(7, 3, |_, _| panic!("must not be called"));
    }

    #[test]
    fn test_parallel_for2_covers_plane() {
        let hits: Vec<AtomicUsize> = (0..6 * 5).map(|_| AtomicUsize::new(0)).collect();
        parallel_for2(0, 6, 0, 5, |i, j| {
            hits[i + 6 * j].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_parallel_for3_covers_volume() {
        let hits: Vec<AtomicUsize> = (0..4 * 4 * 4).map(|_| AtomicUsize::new(0)).collect();
        parallel_for3(0, 4, 0, 4, 0, 4, |i, j, k| {
            hits[i + 4 * (j + 4 * k)].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_range_for3_chunks_outer_axis_only() {
        // Each task must receive the full X/Y ranges and a Z chunk.
        let hits: Vec<AtomicUsize> = (0..3 * 3 * 8).map(|_| AtomicUsize::new(0)).collect();
        parallel_range_for3(0, 3, 0, 3, 0, 8, |x0, x1, y0, y1, z0, z1| {
            assert_eq!((x0, x1), (0, 3));
            assert_eq!((y0, y1), (0, 3));
            for k in z0..z1 {
                for j in y0..y1 {
                    for i in x0..x1 {
                        hits[i + 3 * (j + 3 * k)].fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_range_for2_covers_plane() {
        let hits: Vec<AtomicUsize> = (0..4 * 6).map(|_| AtomicUsize::new(0)).collect();
        parallel_range_for2(0, 4, 0, 6, |x0, x1, y0, y1| {
            for j in y0..y1 {
                for i in x0..x1 {
                    hits[i + 4 * j].fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }
}
