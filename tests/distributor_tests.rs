mod util;

use std::sync::Arc;

use import_plan::prelude::*;
use util::run_ranks;

#[test]
fn create_from_sends_with_unsorted_exports() {
    let got = run_ranks(3, |comm| {
        let me = comm.rank();
        let next = (me + 1) % 3;
        let prev = (me + 2) % 3;
        let (d, n_recv) = Distributor::create_from_sends(comm, &[next, prev, next]).unwrap();
        let payload: Vec<u32> = (0..3).map(|i| 100 * me as u32 + i).collect();
        let mut imports = vec![0u32; n_recv];
        d.do_posts_and_waits(&payload, &mut imports).unwrap();
        (d.images_to().to_vec(), d.images_from().to_vec(), d.remote_pids(), imports)
    });
    for (me, (to, from, pids, imports)) in got.into_iter().enumerate() {
        let next = (me + 1) % 3;
        let prev = (me + 2) % 3;
        let mut peers = vec![next, prev];
        peers.sort_unstable();
        assert_eq!(to, peers);
        assert_eq!(from, peers);
        // `prev` sends its items 0 and 2 here, `next` sends its item 1.
        let from_prev = [100 * prev as u32, 100 * prev as u32 + 2];
        let from_next = [100 * next as u32 + 1];
        let want: Vec<u32> = if prev < next {
            from_prev.iter().chain(&from_next).copied().collect()
        } else {
            from_next.iter().chain(&from_prev).copied().collect()
        };
        assert_eq!(imports, want);
        assert_eq!(pids.len(), 3);
        assert!(pids.is_sorted());
    }
}

#[test]
fn reverse_sends_data_back() {
    let got = run_ranks(2, |comm| {
        let me = comm.rank();
        let other = 1 - me;
        let (d, n) = Distributor::create_from_sends(comm, &[other, other]).unwrap();
        let fwd: Vec<u64> = vec![me as u64 * 10, me as u64 * 10 + 1];
        let mut mid = vec![0u64; n];
        d.do_posts_and_waits(&fwd, &mut mid).unwrap();
        let rev = d.reverse();
        assert_eq!(rev.total_send_length(), n);
        let mut back = vec![0u64; 2];
        rev.do_posts_and_waits(&mid, &mut back).unwrap();
        (fwd, back)
    });
    for (fwd, back) in got {
        assert_eq!(fwd, back);
    }
}

#[test]
fn wrong_buffer_length_is_rejected() {
    let d = Distributor::create_from_sends_and_recvs(Arc::new(NoComm), &[0], &[0]).unwrap();
    let err = d.do_posts_and_waits(&[1u8, 2], &mut [0u8]).unwrap_err();
    assert!(matches!(err, ImportError::LengthMismatch { left: 2, right: 1, .. }));
}

#[test]
fn recv_lists_must_be_parallel() {
    let err = Distributor::create_from_recvs(Arc::new(NoComm), &[1, 2], &[0]).unwrap_err();
    assert!(matches!(err, ImportError::LengthMismatch { .. }));
}
