//! Stage 2 of a sparse exchange: move the records themselves.

use std::collections::BTreeMap;

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{cast_slice, records_from_bytes};
use crate::import_error::ImportError;

/// Send `outgoing[p]` to each peer `p` and receive `recv_counts[p]` records
/// from each peer with a non-zero count.
///
/// Peers with empty lists exchange no message. A self entry is copied
/// locally. The result holds one entry per peer with a non-zero receive
/// count, keyed by rank (ascending).
pub fn exchange_records<T, C>(
    outgoing: &BTreeMap<usize, Vec<T>>,
    recv_counts: &[usize],
    comm: &C,
    tag: CommTag,
) -> Result<BTreeMap<usize, Vec<T>>, ImportError>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let me = comm.rank();
    let record = std::mem::size_of::<T>();
    if let Some(&bad) = outgoing.keys().find(|&&p| p >= comm.size()) {
        return Err(ImportError::RankOutOfRange {
            rank: bad,
            size: comm.size(),
        });
    }

    let mut recv_data = Vec::new();
    for (nbr, &n_items) in recv_counts.iter().enumerate() {
        if n_items == 0 || nbr == me {
            continue;
        }
        let mut buffer = vec![0u8; n_items * record];
        let h = comm.irecv(nbr, tag.as_u16(), &mut buffer);
        recv_data.push((nbr, n_items, h));
    }

    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&nbr, items) in outgoing {
        if items.is_empty() || nbr == me {
            continue;
        }
        pending_sends.push(comm.isend(nbr, tag.as_u16(), cast_slice(items)));
    }

    let mut received = BTreeMap::new();
    let mut maybe_err = None;
    let self_count = recv_counts.get(me).copied().unwrap_or(0);
    if self_count > 0 {
        let mine = outgoing.get(&me).cloned().unwrap_or_default();
        if mine.len() == self_count {
            received.insert(me, mine);
        } else {
            maybe_err = Some(ImportError::PartCountMismatch {
                neighbor: me,
                expected: self_count,
                got: mine.len(),
            });
        }
    }

    for (nbr, n_items, h) in recv_data {
        let raw = match h.wait() {
            Some(raw) => raw,
            None => {
                maybe_err.get_or_insert(ImportError::CommError {
                    neighbor: nbr,
                    source: "No data received (wait returned None)".into(),
                });
                continue;
            }
        };
        if raw.len() != n_items * record {
            maybe_err.get_or_insert(ImportError::BufferSizeMismatch {
                neighbor: nbr,
                expected: n_items * record,
                got: raw.len(),
            });
            continue;
        }
        received.insert(nbr, records_from_bytes::<T>(&raw));
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(received),
    }
}
