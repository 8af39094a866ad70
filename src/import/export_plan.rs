//! Export side of a plan: which local source entries go to which rank.

use std::sync::Arc;

use crate::algs::communicator::Communicator;
use crate::data::map::Map;
use crate::distributor::Distributor;
use crate::import_error::ImportError;
use crate::{Gid, Lid};

pub(crate) struct ExportPlan<C> {
    pub export_lids: Vec<Lid>,
    pub export_pids: Vec<usize>,
    pub distributor: Distributor<C>,
}

/// Source LIDs of `export_gids`; every GID must be local to `source`.
pub(crate) fn export_gids_to_lids<C: Communicator>(
    source: &Map<C>,
    export_gids: &[Gid],
) -> Result<Vec<Lid>, ImportError> {
    export_gids
        .iter()
        .map(|&gid| {
            source.local_element(gid).ok_or(ImportError::ExportGidNotLocal {
                gid,
                rank: source.comm().rank(),
            })
        })
        .collect()
}

/// Deliver each remote request to its owner and collect the requests
/// addressed to this rank (collective).
///
/// `remote_pids` should be sorted; the distributor then needs no packing
/// permutation on the receive side.
pub(crate) fn build_export_plan<C: Communicator>(
    source: &Map<C>,
    remote_gids: &[Gid],
    remote_pids: &[usize],
) -> Result<ExportPlan<C>, ImportError> {
    let (distributor, export_gids, export_pids) =
        Distributor::create_from_recvs(Arc::clone(source.comm()), remote_gids, remote_pids)?;
    let export_lids = export_gids_to_lids(source, &export_gids)?;
    Ok(ExportPlan {
        export_lids,
        export_pids,
        distributor,
    })
}
