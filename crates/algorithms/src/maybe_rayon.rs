//! Data-parallel helpers that fall back to sequential iteration.
//!
//! With the `parallel` feature (default) work is spread over rayon's pool;
//! without it the same calls run on the current thread, so algorithm code
//! never needs its own `cfg` switches. Output order is always input order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Evaluate `row_fn` for every row index and concatenate the outputs in row order.
pub(crate) fn collect_rows<T, F>(rows: usize, row_fn: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> Vec<T> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..rows).into_par_iter().flat_map_iter(row_fn).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..rows).flat_map(row_fn).collect()
    }
}

/// Map `f` over a slice, keeping input order.
pub(crate) fn map_items<I, T, F>(items: &[I], f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_rows_keeps_order() {
        let out = collect_rows(50, |r| vec![r; 3]);
        assert_eq!(out.len(), 150);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_map_items_keeps_order() {
        let items: Vec<u32> = (0..100).collect();
        assert_eq!(map_items(&items, |x| x * 2), (0..100).map(|x| x * 2).collect::<Vec<_>>());
    }
}
