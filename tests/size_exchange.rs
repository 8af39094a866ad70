use import_plan::algs::communicator::{CommTag, Communicator, NoComm, Wait};
use import_plan::algs::exchange::{exchange_records, exchange_sizes_all};
use import_plan::algs::wire::{WireCount, WireGid, cast_slice};
use import_plan::import_error::ImportError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone)]
struct DummySendHandle {
    waited: Arc<AtomicBool>,
}

impl Wait for DummySendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.waited.store(true, Ordering::SeqCst);
        None
    }
}

#[derive(Clone)]
struct DummyRecvHandle {
    waited: Arc<AtomicBool>,
    resp: Option<Vec<u8>>,
}

impl Wait for DummyRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.waited.store(true, Ordering::SeqCst);
        self.resp
    }
}

/// Rank 0 of a 3-rank world whose peers answer with canned messages.
struct DummyComm {
    responses: HashMap<(usize, u16), Option<Vec<u8>>>,
    send_flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    recv_flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl DummyComm {
    fn new(responses: HashMap<(usize, u16), Option<Vec<u8>>>) -> Self {
        Self {
            responses,
            send_flags: Arc::new(Mutex::new(Vec::new())),
            recv_flags: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn all_drained(&self) -> bool {
        let sends = self.send_flags.lock().unwrap();
        let recvs = self.recv_flags.lock().unwrap();
        sends.iter().chain(recvs.iter()).all(|f| f.load(Ordering::SeqCst))
    }
}

impl Communicator for DummyComm {
    type SendHandle = DummySendHandle;
    type RecvHandle = DummyRecvHandle;

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {
        let flag = Arc::new(AtomicBool::new(false));
        self.send_flags.lock().unwrap().push(flag.clone());
        DummySendHandle { waited: flag }
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        let flag = Arc::new(AtomicBool::new(false));
        self.recv_flags.lock().unwrap().push(flag.clone());
        let resp = self.responses.get(&(peer, tag)).cloned().unwrap_or(None);
        DummyRecvHandle { waited: flag, resp }
    }

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        3
    }
}

#[test]
fn serial_counts_are_local() {
    let got = exchange_sizes_all(&[3], &NoComm, CommTag::new(1)).unwrap();
    assert_eq!(got, vec![3]);
}

#[test]
fn short_count_drains_all() {
    let tag = CommTag::new(7);
    let mut responses = HashMap::new();
    // rank 1 sends a correct 8-byte count
    responses.insert((1, tag.as_u16()), Some(cast_slice(&[WireCount::new(2)]).to_vec()));
    // rank 2 sends only 2 bytes -> mismatch
    responses.insert((2, tag.as_u16()), Some(vec![0u8; 2]));
    let comm = DummyComm::new(responses);

    let err = exchange_sizes_all(&[0, 1, 1], &comm, tag).unwrap_err();
    match err {
        ImportError::CommError { neighbor, .. } => assert_eq!(neighbor, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(comm.all_drained());
}

#[test]
fn counts_from_peers_are_returned() {
    let tag = CommTag::new(9);
    let mut responses = HashMap::new();
    responses.insert((1, tag.as_u16()), Some(cast_slice(&[WireCount::new(4)]).to_vec()));
    responses.insert((2, tag.as_u16()), Some(cast_slice(&[WireCount::new(0)]).to_vec()));
    let comm = DummyComm::new(responses);

    let got = exchange_sizes_all(&[5, 0, 0], &comm, tag).unwrap();
    assert_eq!(got, vec![5, 4, 0]);
    assert!(comm.all_drained());
}

#[test]
fn missing_records_drain_all() {
    let tag = CommTag::new(11);
    let mut responses = HashMap::new();
    responses.insert((1, tag.as_u16()), Some(cast_slice(&[WireGid::of(42)]).to_vec()));
    responses.insert((2, tag.as_u16()), None);
    let comm = DummyComm::new(responses);

    let mut outgoing = BTreeMap::new();
    outgoing.insert(1usize, vec![WireGid::of(1)]);
    outgoing.insert(2usize, vec![WireGid::of(2), WireGid::of(3)]);
    let err = exchange_records(&outgoing, &[0, 1, 1], &comm, tag).unwrap_err();
    assert!(matches!(err, ImportError::CommError { neighbor: 2, .. }));
    assert!(comm.all_drained());
}

#[test]
fn wrong_record_size_is_reported() {
    let tag = CommTag::new(13);
    let mut responses = HashMap::new();
    responses.insert((1, tag.as_u16()), Some(vec![0u8; 5]));
    let comm = DummyComm::new(responses);

    let err = exchange_records::<WireGid, _>(&BTreeMap::new(), &[0, 1, 0], &comm, tag).unwrap_err();
    assert!(matches!(
        err,
        ImportError::BufferSizeMismatch {
            neighbor: 1,
            expected: 8,
            got: 5
        }
    ));
    assert!(comm.all_drained());
}
