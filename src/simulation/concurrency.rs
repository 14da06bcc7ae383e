use rayon::prelude::*;

/// Sums `f(idx, element)` over all elements in parallel.
pub fn par_iter_reduce1<
    T1: Send + Sync,
    F: Fn(usize, &T1) -> X + Send + Sync,
    X: Send,
    C: Fn(X, X) -> X + Send + Sync,
    I: Fn() -> X + Send + Sync,
>(
    arr1: &[T1],
    identity: I,
    combine: C,
    f: F,
) -> X {
    arr1.par_iter()
        .enumerate()
        .map(|(i, a)| f(i, a))
        .reduce(identity, combine)
}

pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
    arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
        f(idx, v1);
    });
}

#[cfg(test)]
mod tests {
    use super::{par_iter_mut1, par_iter_reduce1};

    #[test]
    fn par_iter_mut1_visits_every_index_once() {
        let mut values = vec![0usize; 1000];
        par_iter_mut1(&mut values, |idx, v| *v += idx);
        assert!(values.iter().enumerate().all(|(i, v)| *v == i));
    }

    #[test]
    fn reduce_matches_sequential_sum() {
        let values: Vec<u64> = (0..10_000).collect();
        let sum = par_iter_reduce1(&values, || 0u64, |a, b| a + b, |_, v| *v);
        assert_eq!(sum, values.iter().sum::<u64>());
    }
}
