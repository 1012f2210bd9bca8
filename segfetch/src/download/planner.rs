//! Splits a resource into per-worker byte ranges.

use super::segment::Segment;
use crate::error::{DownloadError, DownloadResult};

/// Partition `[0, total_length)` into `workers` contiguous segments.
///
/// Every segment but the last gets `total_length / workers` bytes. The last
/// segment absorbs the remainder, so it is never smaller than the others.
/// An empty resource yields a single zero-length segment.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidWorkerCount`] when `workers` is zero.
///
/// # Example
///
/// ```
/// use segfetch::download::plan;
///
/// let segments = plan(100, 3).unwrap();
/// let lengths: Vec<u64> = segments.iter().map(|s| s.length).collect();
/// assert_eq!(lengths, vec![33, 33, 34]);
/// ```
pub fn plan(total_length: u64, workers: usize) -> DownloadResult<Vec<Segment>> {
    if workers == 0 {
        return Err(DownloadError::InvalidWorkerCount(workers));
    }

    if total_length == 0 {
        return Ok(vec![Segment::new(0, 0, 0)]);
    }

    let count = workers as u64;
    let base = total_length / count;

    let segments = (0..workers)
        .map(|index| {
            let start = index as u64 * base;
            let length = if index + 1 == workers {
                total_length - base * (count - 1)
            } else {
                base
            };
            Segment::new(index, start, length)
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(segments: &[Segment]) -> Vec<(u64, u64)> {
        segments.iter().map(|s| (s.start, s.end())).collect()
    }

    #[test]
    fn test_remainder_goes_to_last_segment() {
        let segments = plan(100, 3).unwrap();
        assert_eq!(bounds(&segments), vec![(0, 33), (33, 66), (66, 100)]);
    }

    #[test]
    fn test_even_split() {
        let segments = plan(1000, 4).unwrap();
        assert!(segments.iter().all(|s| s.length == 250));
        assert_eq!(segments.last().unwrap().end(), 1000);
    }

    #[test]
    fn test_single_worker_spans_resource() {
        let segments = plan(12345, 1).unwrap();
        assert_eq!(segments, vec![Segment::new(0, 0, 12345)]);
    }

    #[test]
    fn test_empty_resource() {
        let segments = plan(0, 8).unwrap();
        assert_eq!(segments, vec![Segment::new(0, 0, 0)]);
    }

    #[test]
    fn test_more_workers_than_bytes() {
        let segments = plan(3, 5).unwrap();
        assert_eq!(segments.len(), 5);
        assert!(segments[..4].iter().all(Segment::is_empty));
        assert_eq!(segments[4], Segment::new(4, 0, 3));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = plan(100, 0);
        assert!(matches!(result, Err(DownloadError::InvalidWorkerCount(0))));
    }

    #[test]
    fn test_plan_is_deterministic() {
        assert_eq!(plan(1003, 4).unwrap(), plan(1003, 4).unwrap());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_segments_tile_the_resource(
                total in 0u64..10_000_000,
                workers in 1usize..64
            ) {
                let segments = plan(total, workers)?;

                prop_assert_eq!(segments[0].start, 0);
                prop_assert_eq!(segments.last().unwrap().end(), total);

                for pair in segments.windows(2) {
                    prop_assert_eq!(
                        pair[0].end(), pair[1].start,
                        "gap or overlap between {} and {}", pair[0], pair[1]
                    );
                }

                let covered: u64 = segments.iter().map(|s| s.length).sum();
                prop_assert_eq!(covered, total);
            }

            #[test]
            fn test_indices_are_sequential(
                total in 1u64..10_000_000,
                workers in 1usize..64
            ) {
                let segments = plan(total, workers)?;
                prop_assert_eq!(segments.len(), workers);
                for (i, segment) in segments.iter().enumerate() {
                    prop_assert_eq!(segment.index, i);
                }
            }

            #[test]
            fn test_last_segment_is_largest(
                total in 1u64..10_000_000,
                workers in 1usize..64
            ) {
                let segments = plan(total, workers)?;
                let base = total / workers as u64;

                for segment in &segments[..segments.len() - 1] {
                    prop_assert_eq!(segment.length, base);
                }
                prop_assert!(segments.last().unwrap().length >= base);
            }
        }
    }
}
