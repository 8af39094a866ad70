#![allow(dead_code)]
use std::sync::Arc;

use import_plan::prelude::*;

/// Run `f` once per rank of a fresh `size`-rank thread world and collect
/// the results in rank order.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(Arc<RayonComm>) -> R + Sync,
{
    let comms = RayonComm::world(size);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| s.spawn(move || f(Arc::new(c))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

/// Collective map with the given local GIDs and index base 0.
pub fn map(comm: &Arc<RayonComm>, gids: &[Gid]) -> Arc<Map<RayonComm>> {
    Arc::new(Map::new(None, gids.to_vec(), 0, Arc::clone(comm)).unwrap())
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

/// `(sender, receiver, gid)` triples of every export of `plan` on its rank.
pub fn export_triples(plan: &Import<RayonComm>) -> Vec<(usize, usize, Gid)> {
    let me = plan.source_map().comm().rank();
    plan.export_lids()
        .iter()
        .zip(plan.export_pids())
        .map(|(&lid, &pid)| (me, pid, plan.source_map().global_element(lid).unwrap()))
        .collect()
}

/// `(owner, receiver, gid)` triples of every remote entry of `plan` on its rank.
pub fn remote_triples(plan: &Import<RayonComm>) -> Vec<(usize, usize, Gid)> {
    let me = plan.source_map().comm().rank();
    plan.remote_pids()
        .iter()
        .zip(plan.remote_gids())
        .map(|(&pid, gid)| (pid, me, gid))
        .collect()
}
