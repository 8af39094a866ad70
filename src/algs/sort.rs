//! Stable co-permutation of parallel arrays.
//!
//! Plan construction keeps several arrays in lock-step (owning ranks, GIDs,
//! LIDs). Sorting one of them must apply the same permutation to the
//! others; ties keep their original relative order.

use crate::import_error::ImportError;

/// Stable permutation that sorts `keys` ascending.
fn sorting_permutation<K: Ord>(keys: &[K]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..keys.len()).collect();
    perm.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    perm
}

fn apply_permutation<T: Clone>(values: &mut Vec<T>, perm: &[usize]) {
    let permuted: Vec<T> = perm.iter().map(|&i| values[i].clone()).collect();
    *values = permuted;
}

/// Sort `keys` ascending and apply the same permutation to `values`.
pub fn sort2<K, A>(keys: &mut Vec<K>, values: &mut Vec<A>) -> Result<(), ImportError>
where
    K: Ord + Clone,
    A: Clone,
{
    if keys.len() != values.len() {
        return Err(ImportError::LengthMismatch {
            what: "sort2 keys vs values",
            left: keys.len(),
            right: values.len(),
        });
    }
    if keys.is_sorted() {
        return Ok(());
    }
    let perm = sorting_permutation(keys);
    apply_permutation(keys, &perm);
    apply_permutation(values, &perm);
    Ok(())
}

/// Sort `keys` ascending and apply the same permutation to `a` and `b`.
///
/// A length mismatch is an internal consistency failure: callers build the
/// three arrays together.
pub fn sort3<K, A, B>(keys: &mut Vec<K>, a: &mut Vec<A>, b: &mut Vec<B>) -> Result<(), ImportError>
where
    K: Ord + Clone,
    A: Clone,
    B: Clone,
{
    if keys.len() != a.len() || a.len() != b.len() {
        return Err(ImportError::Internal(format!(
            "sort3 size mismatch: keys={}, first={}, second={}",
            keys.len(),
            a.len(),
            b.len()
        )));
    }
    if keys.is_sorted() {
        return Ok(());
    }
    let perm = sorting_permutation(keys);
    apply_permutation(keys, &perm);
    apply_permutation(a, &perm);
    apply_permutation(b, &perm);
    Ok(())
}
