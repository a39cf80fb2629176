use fieldinv_core::chunk::{build_chunks, split_chunks_mut};
use fieldinv_core::ChunkScheduler;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_chunks_cover_range_exactly_once(n in 1usize..5000, workers in 1usize..64) {
        let chunks = build_chunks(n, workers);
        prop_assert_eq!(chunks.len(), n.min(workers));

        let mut seen = vec![0u8; n];
        for chunk in &chunks {
            for k in chunk.first..=chunk.last {
                seen[k] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&c| c == 1), "gap or overlap for n={}, workers={}", n, workers);

        let min = chunks.iter().map(|c| c.len()).min().unwrap();
        let max = chunks.iter().map(|c| c.len()).max().unwrap();
        prop_assert!(max - min <= 1, "unbalanced chunks: {} vs {}", min, max);
    }

    #[test]
    fn test_chunks_are_contiguous_and_ordered(n in 1usize..2000, workers in 1usize..32) {
        let chunks = build_chunks(n, workers);
        prop_assert_eq!(chunks[0].first, 0);
        prop_assert_eq!(chunks[chunks.len() - 1].last, n - 1);
        for (i, pair) in chunks.windows(2).enumerate() {
            prop_assert_eq!(pair[0].index, i);
            prop_assert_eq!(pair[0].last + 1, pair[1].first);
        }
    }
}

#[test]
fn test_empty_range_has_no_chunks() {
    assert!(build_chunks(0, 4).is_empty());
}

#[test]
fn test_dispatch_writes_disjoint_slices() {
    let scheduler = ChunkScheduler::with_workers(4);
    let chunks = scheduler.build(1001);
    let mut data = vec![0usize; 1001 * 3];
    let slices = split_chunks_mut(&mut data, &chunks, 3);
    let work: Vec<_> = chunks.iter().copied().zip(slices).collect();

    let written = scheduler
        .dispatch(work, |(chunk, slice)| {
            for (local, cell) in slice.chunks_exact_mut(3).enumerate() {
                cell.iter_mut().for_each(|v| *v = chunk.first + local);
            }
            slice.len() / 3
        })
        .unwrap();

    assert_eq!(written.iter().sum::<usize>(), 1001);
    for (k, cell) in data.chunks_exact(3).enumerate() {
        assert!(cell.iter().all(|&v| v == k), "voxel {} holds {:?}", k, cell);
    }
}
