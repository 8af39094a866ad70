mod util;

use std::sync::Arc;

use import_plan::prelude::*;
use util::{assert_permutation, export_triples, map, remote_triples, run_ranks};

const TGT1: [&[Gid]; 2] = [&[0, 1, 4], &[4, 5, 0]];
const TGT2: [&[Gid]; 2] = [&[0, 2, 5, 6], &[4, 7, 1]];

fn union_on_ranks(strategy: ExportStrategy) -> Vec<Import<RayonComm>> {
    run_ranks(2, move |comm| {
        let r = comm.rank();
        let src = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let cfg = ImportConfig::default().with_export_strategy(strategy);
        let p1 = Import::with_config(src.clone(), map(&comm, TGT1[r]), cfg).unwrap();
        let p2 = Import::with_config(src, map(&comm, TGT2[r]), cfg).unwrap();
        let u = p1.set_union(&p2).unwrap();
        u.validate_invariants().unwrap();
        u
    })
}

#[test]
fn union_layout_on_two_ranks() {
    let plans = union_on_ranks(ExportStrategy::FromRecvs);

    let u0 = &plans[0];
    assert_eq!(u0.target_map().element_list(), &[0, 1, 2, 4, 5, 6]);
    assert_eq!(u0.num_same_ids(), 2);
    assert_eq!(u0.permute_to_lids(), &[2]);
    assert_eq!(u0.permute_from_lids(), &[2]);
    assert_eq!(u0.remote_lids(), &[3, 4, 5]);
    assert_eq!(u0.remote_pids(), &[1, 1, 1]);
    assert_eq!(u0.export_lids(), &[0, 1]);
    assert_eq!(u0.export_pids(), &[1, 1]);

    let u1 = &plans[1];
    assert_eq!(u1.target_map().element_list(), &[4, 5, 7, 0, 1]);
    assert_eq!(u1.permute_from_lids(), &[3]);
    assert_eq!(u1.remote_gids(), vec![0, 1]);
    assert_eq!(u1.export_lids(), &[0, 1, 2]);
    assert_eq!(u1.export_pids(), &[0, 0, 0]);
}

#[test]
fn union_export_strategies_agree() {
    let recvs = union_on_ranks(ExportStrategy::FromRecvs);
    let sends = union_on_ranks(ExportStrategy::FromSends);
    for (a, b) in recvs.iter().zip(&sends) {
        assert_eq!(a.target_map().element_list(), b.target_map().element_list());
        assert_eq!(a.export_lids(), b.export_lids());
        assert_eq!(a.export_pids(), b.export_pids());
        assert_eq!(a.remote_pids(), b.remote_pids());
        assert_eq!(a.distributor().images_from(), b.distributor().images_from());
    }
    let mut exports: Vec<_> = sends.iter().flat_map(export_triples).collect();
    let mut remotes: Vec<_> = sends.iter().flat_map(remote_triples).collect();
    exports.sort_unstable();
    remotes.sort_unstable();
    assert_eq!(exports, remotes);
}

#[test]
fn union_plan_moves_data() {
    let got = run_ranks(2, |comm| {
        let r = comm.rank();
        let src = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let cfg = ImportConfig::default().with_export_strategy(ExportStrategy::FromSends);
        let p1 = Import::with_config(src.clone(), map(&comm, TGT1[r]), cfg).unwrap();
        let p2 = Import::with_config(src.clone(), map(&comm, TGT2[r]), cfg).unwrap();
        let u = p1.set_union(&p2).unwrap();
        let src_vals: Vec<Gid> = src.element_list().iter().map(|g| g + 100).collect();
        let mut tgt_vals = vec![0; u.target_map().num_local_elements()];
        u.import_values(&src_vals, &mut tgt_vals, CombineMode::Insert).unwrap();
        let want: Vec<Gid> = u.target_map().element_list().iter().map(|g| g + 100).collect();
        (tgt_vals, want)
    });
    for (got, want) in got {
        assert_eq!(got, want);
    }
}

#[test]
fn union_is_commutative_in_gid_set() {
    let pairs = run_ranks(2, |comm| {
        let r = comm.rank();
        let src = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let p1 = Import::new(src.clone(), map(&comm, TGT1[r])).unwrap();
        let p2 = Import::new(src, map(&comm, TGT2[r])).unwrap();
        let a = p1.set_union(&p2).unwrap();
        let b = p2.set_union(&p1).unwrap();
        (
            a.target_map().element_list().to_vec(),
            b.target_map().element_list().to_vec(),
        )
    });
    for (a, b) in pairs {
        assert_permutation(&a, &b);
    }
}

#[test]
fn union_with_itself_is_identity() {
    let checks = run_ranks(2, |comm| {
        let r = comm.rank();
        let src = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let p = Import::new(src, map(&comm, TGT2[r])).unwrap();
        let u = p.set_union(&p).unwrap();
        Arc::ptr_eq(u.target_map(), p.target_map())
            && u.remote_lids() == p.remote_lids()
            && u.export_lids() == p.export_lids()
            && u.num_same_ids() == p.num_same_ids()
    });
    assert!(checks.into_iter().all(|ok| ok));
}

#[test]
fn union_with_source_appends_remotes() {
    let plans = run_ranks(2, |comm| {
        let r = comm.rank();
        let src = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let p = Import::new(src, map(&comm, TGT1[r])).unwrap();
        let u = p.set_union_with_source().unwrap();
        u.validate_invariants().unwrap();
        (p, u)
    });
    let (p0, u0) = &plans[0];
    assert_eq!(u0.target_map().element_list(), &[0, 1, 2, 3, 4]);
    assert_eq!(u0.num_same_ids(), 4);
    assert_eq!(u0.remote_lids(), &[4]);
    assert_eq!(u0.export_lids(), p0.export_lids());
    assert!(Arc::ptr_eq(u0.distributor(), p0.distributor()));
    let (_, u1) = &plans[1];
    assert_eq!(u1.target_map().element_list(), &[4, 5, 6, 7, 0]);
}

#[test]
fn union_rejects_different_sources() {
    let results = run_ranks(2, |comm| {
        let r = comm.rank();
        let a = Arc::new(Map::contiguous(8, 0, comm.clone()).unwrap());
        let b = Arc::new(Map::contiguous(8, 1, comm.clone()).unwrap());
        let p1 = Import::new(a, map(&comm, TGT1[r])).unwrap();
        let p2 = Import::new(b, map(&comm, TGT1[r])).unwrap();
        p1.set_union(&p2).map(|_| ())
    });
    assert!(
        results
            .iter()
            .all(|r| matches!(r, Err(ImportError::SourceMapMismatch)))
    );
}
