//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the exchange helpers call
//! `.wait()` before they trust that a buffer is ready. Messages between one
//! `(source, destination, tag)` triple are delivered in FIFO order, which is
//! what lets consecutive collectives reuse a tag.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

/// Non-blocking point-to-point communication.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process.
    fn rank(&self) -> usize;
    /// Number of processes in the communicator.
    fn size(&self) -> usize;

    /// Gather `send` from every rank into `recv`, ordered by rank.
    ///
    /// Every rank must contribute the same number of bytes and
    /// `recv.len() == send.len() * size()`.
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        let n = send.len();
        let me = self.rank();
        recv[me * n..(me + 1) * n].copy_from_slice(send);

        let peers: Vec<usize> = (0..self.size()).filter(|&p| p != me).collect();
        let mut scratch = vec![0u8; n];
        let recvs: Vec<(usize, Self::RecvHandle)> = peers
            .iter()
            .map(|&p| (p, self.irecv(p, CommTag::ALLGATHER.as_u16(), &mut scratch)))
            .collect();
        let sends: Vec<Self::SendHandle> = peers
            .iter()
            .map(|&p| self.isend(p, CommTag::ALLGATHER.as_u16(), send))
            .collect();
        for (p, h) in recvs {
            if let Some(data) = h.wait() {
                let len = data.len().min(n);
                recv[p * n..p * n + len].copy_from_slice(&data[..len]);
            }
        }
        for s in sends {
            let _ = s.wait();
        }
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self) {
        let mut sink = vec![0u8; self.size()];
        self.allgather(&[1], &mut sink);
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Tag used by the provided `allgather`/`barrier` collectives.
    pub const ALLGATHER: CommTag = CommTag(0x0A11);
    /// Base tag for directory construction traffic.
    pub const DIRECTORY_BUILD: CommTag = CommTag(0x0D10);
    /// Base tag for directory lookups.
    pub const DIRECTORY_QUERY: CommTag = CommTag(0x0D20);
    /// Base tag for distributor plan setup.
    pub const DISTRIBUTOR_PLAN: CommTag = CommTag(0x0E10);
    /// Base tag for distributor data movement.
    pub const DISTRIBUTOR_DATA: CommTag = CommTag(0x0E20);

    pub const fn new(v: u16) -> Self {
        Self(v)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `n` slots after this one.
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

/// Tag pair for a two-phase (counts, then records) exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExchangeTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl ExchangeTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
        }
    }
}

/// Gather one `u64` per rank.
pub fn allgather_u64<C: Communicator + ?Sized>(comm: &C, value: u64) -> Vec<u64> {
    let n_ranks = comm.size().max(1);
    let mut recvbuf = vec![0u8; n_ranks * std::mem::size_of::<u64>()];
    comm.allgather(&value.to_le_bytes(), &mut recvbuf);
    recvbuf
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            u64::from_le_bytes(raw)
        })
        .collect()
}

/// Logical AND of `flag` over all ranks.
pub fn all_reduce_and<C: Communicator + ?Sized>(comm: &C, flag: bool) -> bool {
    allgather_u64(comm, flag as u64).iter().all(|&v| v != 0)
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// Shared mailbox of one thread-backed "world".
#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    lock: Mutex<()>,
    ready: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
        let _guard = self.lock.lock();
        self.ready.notify_all();
    }

    fn try_take(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }

    fn take_blocking(&self, key: &Key) -> Bytes {
        let mut guard = self.lock.lock();
        loop {
            if let Some(bytes) = self.try_take(key) {
                return bytes;
            }
            self.ready.wait(&mut guard);
        }
    }
}

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(Mailbox::default()));

pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let bytes = self.mailbox.take_blocking(&self.key);
        let len = self.len.min(bytes.len());
        Some(bytes[..len].to_vec())
    }
}

/// Thread-backed communicator: each rank runs on its own thread and
/// messages travel through a shared in-memory mailbox.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl RayonComm {
    /// Join the process-wide default world as `rank` of `size`.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: Arc::clone(&MAILBOX),
        }
    }

    /// Create `size` communicators sharing a fresh, isolated mailbox.
    ///
    /// Worlds created this way never see each other's messages, so
    /// concurrently running tests can use the same tags.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox.post(key, Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination as _, Source as _};

    /// Communicator over `MPI_COMM_WORLD`.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI; `None` if it was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// Outstanding MPI request plus the staged buffer it borrows.
    pub struct MpiHandle {
        finish: Option<Box<dyn FnOnce() -> Option<Vec<u8>>>>,
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            self.finish.take().and_then(|f| f())
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            if let Some(f) = self.finish.take() {
                let _ = f();
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            // The staged copy outlives the request; it is reclaimed after `wait`.
            let raw: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            let staged: &'static [u8] = unsafe { &*raw };
            let req = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                staged,
                i32::from(tag),
            );
            MpiHandle {
                finish: Some(Box::new(move || {
                    let _ = req.wait();
                    drop(unsafe { Box::from_raw(raw) });
                    None
                })),
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let raw: *mut [u8] = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            let staged: &'static mut [u8] = unsafe { &mut *raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, staged, i32::from(tag));
            MpiHandle {
                finish: Some(Box::new(move || {
                    let _ = req.wait();
                    let data = unsafe { Box::from_raw(raw) };
                    Some(data.into_vec())
                })),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rayon_roundtrip_two_ranks() {
        let comm0 = RayonComm::new(0, 2);
        let comm1 = RayonComm::new(1, 2);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        let send_handle = comm0.isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn worlds_are_isolated() {
        let a = RayonComm::world(2);
        let b = RayonComm::world(2);
        a[0].isend(1, 3, &[1]);
        b[0].isend(1, 3, &[2]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 3, &mut buf).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 3, &mut buf).wait(), Some(vec![1]));
    }

    #[test]
    fn allgather_on_threads() {
        let comms = RayonComm::world(3);
        let gathered: Vec<Vec<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| s.spawn(move || allgather_u64(c, 10 * c.rank() as u64 + 1)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for g in gathered {
            assert_eq!(g, vec![1, 11, 21]);
        }
    }

    #[test]
    fn no_comm_collectives_are_local() {
        let comm = NoComm;
        assert_eq!(allgather_u64(&comm, 5), vec![5]);
        assert!(all_reduce_and(&comm, true));
        assert!(!all_reduce_and(&comm, false));
        comm.barrier();
    }
}
