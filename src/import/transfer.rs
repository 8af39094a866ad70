//! Moving values with a finished plan.

use std::ops::Add;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use super::Import;
use crate::algs::communicator::Communicator;
use crate::import_error::ImportError;

/// How received values are merged into their destination slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineMode {
    /// Overwrite the destination.
    #[default]
    Insert,
    /// Add to the destination.
    Add,
}

impl CombineMode {
    pub fn combine<T: Copy + Add<Output = T>>(self, slot: &mut T, incoming: T) {
        *slot = match self {
            CombineMode::Insert => incoming,
            CombineMode::Add => *slot + incoming,
        };
    }
}

impl<C: Communicator> Import<C> {
    /// Fill `target_values` (one per target LID) from `source_values` (one
    /// per source LID). Collective among the ranks linked by the plan.
    ///
    /// Same and permuted entries are always overwritten; `mode` applies to
    /// entries received from other ranks.
    pub fn import_values<T>(
        &self,
        source_values: &[T],
        target_values: &mut [T],
        mode: CombineMode,
    ) -> Result<(), ImportError>
    where
        T: Pod + Add<Output = T>,
    {
        let n_src = self.source.num_local_elements();
        let n_tgt = self.target.num_local_elements();
        if source_values.len() != n_src {
            return Err(ImportError::LengthMismatch {
                what: "source values vs source map",
                left: source_values.len(),
                right: n_src,
            });
        }
        if target_values.len() != n_tgt {
            return Err(ImportError::LengthMismatch {
                what: "target values vs target map",
                left: target_values.len(),
                right: n_tgt,
            });
        }

        target_values[..self.num_same].copy_from_slice(&source_values[..self.num_same]);
        for (&to, &from) in self.permute_to_lids.iter().zip(&self.permute_from_lids) {
            target_values[to] = source_values[from];
        }

        let packed: Vec<T> = self.export_lids.iter().map(|&lid| source_values[lid]).collect();
        let mut received = vec![T::zeroed(); self.remote_lids.len()];
        self.distributor.do_posts_and_waits(&packed, &mut received)?;
        for (&lid, value) in self.remote_lids.iter().zip(received) {
            mode.combine(&mut target_values[lid], value);
        }
        Ok(())
    }

    /// Send `target_values` back along the plan into `source_values`
    /// (the reverse direction of [`import_values`](Self::import_values)).
    ///
    /// With [`CombineMode::Add`] contributions from several ranks to one
    /// source entry are summed.
    pub fn export_values<T>(
        &self,
        target_values: &[T],
        source_values: &mut [T],
        mode: CombineMode,
    ) -> Result<(), ImportError>
    where
        T: Pod + Add<Output = T>,
    {
        self.reverse().import_values(target_values, source_values, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::data::map::Map;
    use crate::import::{ImportConfig, UserExports};
    use std::sync::Arc;

    #[test]
    fn combine_modes() {
        let mut v = 3;
        CombineMode::Add.combine(&mut v, 4);
        assert_eq!(v, 7);
        CombineMode::Insert.combine(&mut v, 1);
        assert_eq!(v, 1);
    }

    #[test]
    fn serial_import_with_self_remotes() {
        let comm = Arc::new(NoComm);
        let src = Arc::new(Map::new(None, vec![0, 1, 2], 0, comm.clone()).unwrap());
        let tgt = Arc::new(Map::new(None, vec![0, 2, 1, 5], 0, comm).unwrap());
        let user = UserExports {
            remote_pids: vec![0],
            export_lids: vec![2],
            export_pids: vec![0],
        };
        let plan = Import::with_user_exports(src, tgt, user, ImportConfig::default()).unwrap();
        let mut out = [100.0f64; 4];
        plan.import_values(&[1.0, 2.0, 3.0], &mut out, CombineMode::Add).unwrap();
        assert_eq!(out, [1.0, 3.0, 2.0, 103.0]);

        let mut back = [0.0f64; 3];
        plan.export_values(&[1.0, 2.0, 3.0, 4.0], &mut back, CombineMode::Add).unwrap();
        assert_eq!(back, [1.0, 3.0, 6.0]);
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let comm = Arc::new(NoComm);
        let m = Arc::new(Map::new(None, vec![0, 1], 0, comm).unwrap());
        let plan = Import::new(m.clone(), m).unwrap();
        let err = plan.import_values(&[1u32], &mut [0u32; 2], CombineMode::Insert).unwrap_err();
        assert!(matches!(err, ImportError::LengthMismatch { .. }));
    }
}
