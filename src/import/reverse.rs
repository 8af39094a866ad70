//! Plans derived from an existing plan without new ownership resolution.

use std::sync::Arc;

use super::Import;
use crate::algs::communicator::Communicator;
use crate::data::map::Map;
use crate::debug_invariants::DebugInvariants;
use crate::import_error::ImportError;

impl<C: Communicator> Import<C> {
    /// Plan from this plan's target back to its source. No communication.
    ///
    /// Remote and export sides trade places; `reverse(reverse(p))` equals
    /// `p` entry for entry.
    pub fn reverse(&self) -> Self {
        let plan = Self {
            source: Arc::clone(&self.target),
            target: Arc::clone(&self.source),
            num_same: self.num_same,
            permute_to_lids: self.permute_from_lids.clone(),
            permute_from_lids: self.permute_to_lids.clone(),
            remote_lids: self.export_lids.clone(),
            remote_pids: self.export_pids.clone(),
            export_lids: self.remote_lids.clone(),
            export_pids: self.remote_pids.clone(),
            distributor: Arc::new(self.distributor.reverse()),
            config: self.config,
            reversed: !self.reversed,
        };
        plan.debug_assert_invariants();
        plan
    }

    /// Restrict this plan to its remote entries (no communication).
    ///
    /// `remote_target` must hold exactly this plan's remote GIDs, in an order
    /// that keeps their relative order. The new plan has no same or
    /// permuted entries and shares the export side and distributor.
    pub fn create_remote_only_import(&self, remote_target: Arc<Map<C>>) -> Result<Self, ImportError> {
        let n = self.remote_lids.len();
        if remote_target.num_local_elements() != n {
            return Err(ImportError::RemoteMapSizeMismatch {
                expected: n,
                got: remote_target.num_local_elements(),
            });
        }

        let mut remote_lids = Vec::with_capacity(n);
        for (i, &old) in self.remote_lids.iter().enumerate() {
            let gid = self.target.global_element(old).ok_or_else(|| {
                ImportError::Internal(format!("remote LID {old} is not in the target map"))
            })?;
            let new = remote_target
                .local_element(gid)
                .ok_or(ImportError::RemoteGidMissing { gid })?;
            if let Some(&previous) = remote_lids.last() {
                if new < previous {
                    return Err(ImportError::RemoteOrderMismatch {
                        index: i,
                        previous,
                        current: new,
                    });
                }
            }
            remote_lids.push(new);
        }

        let plan = Self {
            source: Arc::clone(&self.source),
            target: remote_target,
            num_same: 0,
            permute_to_lids: Vec::new(),
            permute_from_lids: Vec::new(),
            remote_lids,
            remote_pids: self.remote_pids.clone(),
            export_lids: self.export_lids.clone(),
            export_pids: self.export_pids.clone(),
            distributor: Arc::clone(&self.distributor),
            config: self.config,
            reversed: self.reversed,
        };
        plan.debug_assert_invariants();
        Ok(plan)
    }
}
