//! Stage 1 of a sparse exchange: tell every peer how many records to expect.
//!
//! The count exchange is dense (one [`WireCount`] per ordered pair of ranks)
//! so that a rank learns who will send to it without knowing it in advance.
//! All functions take a typed [`CommTag`] and guarantee that every
//! send/receive handle is drained before returning, even if an error occurs.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut};
use crate::import_error::ImportError;

/// Exchange `send_counts[p]` (records this rank will send to `p`) with every
/// peer. Returns `recv_counts[p]`, the records `p` will send to this rank.
///
/// The self entry is copied locally without a message.
pub fn exchange_sizes_all<C>(
    send_counts: &[usize],
    comm: &C,
    tag: CommTag,
) -> Result<Vec<usize>, ImportError>
where
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let me = comm.rank();
    if send_counts.len() != size {
        return Err(ImportError::LengthMismatch {
            what: "send counts vs communicator size",
            left: send_counts.len(),
            right: size,
        });
    }

    // 1) post all receives
    let mut recv_size = Vec::with_capacity(size.saturating_sub(1));
    for nbr in (0..size).filter(|&p| p != me) {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            nbr,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        recv_size.push((nbr, h));
    }

    // 2) post all sends and keep buffers alive until completion
    let mut pending_sends = Vec::with_capacity(size.saturating_sub(1));
    let mut send_bufs = Vec::with_capacity(size.saturating_sub(1));
    for nbr in (0..size).filter(|&p| p != me) {
        let count = WireCount::new(send_counts[nbr]);
        pending_sends.push(comm.isend(
            nbr,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&count)),
        ));
        send_bufs.push(count);
    }

    // 3) wait for all recvs, collect counts (but do not early–return)
    let mut sizes_in = vec![0usize; size];
    sizes_in[me] = send_counts[me];
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                if maybe_err.is_none() {
                    let mut cnt = WireCount::new(0);
                    cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
                    sizes_in[nbr] = cnt.get();
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(ImportError::CommError {
                    neighbor: nbr,
                    source: format!(
                        "expected {} bytes for size header, got {}",
                        std::mem::size_of::<WireCount>(),
                        data.len()
                    )
                    .into(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(ImportError::CommError {
                    neighbor: nbr,
                    source: format!("failed to receive size from rank {nbr}").into(),
                });
            }
            _ => {} // already have an error; just drain
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }
    drop(send_bufs);

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}
