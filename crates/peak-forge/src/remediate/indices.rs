//! Canonical DIM-transfer index tables.
//!
//! An index names one way of pairing the axes of a list: a single pair for 2D and 3D lists,
//! two disjoint pairs for 4D lists. Axes are zero-based.

const PAIRS_2D: &[&[(usize, usize)]] = &[&[(0, 1)]];
const PAIRS_3D: &[&[(usize, usize)]] = &[&[(0, 1)], &[(1, 2)], &[(2, 0)]];
const PAIRS_4D: &[&[(usize, usize)]] = &[
    &[(0, 1), (2, 3)],
    &[(0, 2), (1, 3)],
    &[(0, 3), (1, 2)],
];

/// The index table of a dimensionality; empty for lists that have none.
pub fn transfer_pairs(num_dim: usize) -> &'static [&'static [(usize, usize)]] {
    match num_dim {
        2 => PAIRS_2D,
        3 => PAIRS_3D,
        4 => PAIRS_4D,
        _ => &[],
    }
}

/// Finds the index whose pairs contain the unordered axis pair `(a, b)`.
pub fn index_of(num_dim: usize, a: usize, b: usize) -> Option<usize> {
    transfer_pairs(num_dim).iter().position(|pairs| {
        pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_cover_supported_dimensionalities() {
        assert_eq!(transfer_pairs(2).len(), 1);
        assert_eq!(transfer_pairs(3).len(), 3);
        assert_eq!(transfer_pairs(4).len(), 3);
        assert!(transfer_pairs(1).is_empty());
        assert!(transfer_pairs(5).is_empty());
    }

    #[test]
    fn four_dimensional_indices_partition_the_axes() {
        for pairs in transfer_pairs(4) {
            let mut axes: Vec<usize> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
            axes.sort_unstable();
            assert_eq!(axes, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn index_lookup_is_order_insensitive() {
        assert_eq!(index_of(3, 0, 2), Some(2));
        assert_eq!(index_of(3, 2, 1), Some(1));
        assert_eq!(index_of(4, 3, 1), Some(1));
        assert_eq!(index_of(2, 0, 0), None);
        assert_eq!(index_of(5, 0, 1), None);
    }
}
