//! Import: the communication plan between a source and a target map.
//!
//! An [`Import`] tells every rank how to fill a target-distributed array
//! from a source-distributed one:
//!
//! - the first `num_same_ids()` entries are copied in place,
//! - `permute_from_lids()[i]` is copied to `permute_to_lids()[i]`,
//! - `remote_lids()` are received from `remote_pids()`,
//! - `export_lids()` are sent to `export_pids()`.
//!
//! Construction from two maps runs classification, owner resolution and
//! export discovery in sequence; failure at any stage returns an error and
//! no plan. A finished plan is immutable and can be shared across threads.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use import_plan::algs::communicator::NoComm;
//! use import_plan::data::map::Map;
//! use import_plan::import::Import;
//!
//! let comm = Arc::new(NoComm);
//! let source = Arc::new(Map::new(None, vec![0, 1, 2, 3], 0, comm.clone())?);
//! let target = Arc::new(Map::new(None, vec![0, 1, 3, 2], 0, comm)?);
//! let plan = Import::new(source, target)?;
//! assert_eq!(plan.num_same_ids(), 2);
//! assert_eq!(plan.permute_from_lids(), &[3, 2]);
//! # Ok::<(), import_plan::import_error::ImportError>(())
//! ```

pub mod classify;
pub mod config;
mod export_plan;
mod resolve;
mod reverse;
pub mod transfer;
mod union;

use std::fmt;
use std::sync::Arc;

use crate::algs::communicator::Communicator;
use crate::algs::sort::sort3;
use crate::data::map::Map;
use crate::debug_invariants::DebugInvariants;
use crate::distributor::Distributor;
use crate::import_error::ImportError;
use crate::{Gid, Lid};

pub use classify::{Classification, classify};
pub use config::{ExportStrategy, ImportConfig, UnownedRemoteHandling};
pub use transfer::CombineMode;

use export_plan::build_export_plan;
use resolve::resolve_remote_owners;

/// Precomputed plan arrays adopted by [`Import::from_parts`].
pub struct ImportParts<C> {
    pub num_same: usize,
    pub permute_to_lids: Vec<Lid>,
    pub permute_from_lids: Vec<Lid>,
    pub remote_lids: Vec<Lid>,
    pub export_lids: Vec<Lid>,
    pub export_pids: Vec<usize>,
    /// Its receive side defines the owner of every remote LID.
    pub distributor: Distributor<C>,
}

/// Caller-supplied ownership and export information for
/// [`Import::with_user_exports`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserExports {
    /// Owner of each remote target entry, in classification order.
    pub remote_pids: Vec<usize>,
    pub export_lids: Vec<Lid>,
    pub export_pids: Vec<usize>,
}

/// Communication plan from `source` to `target`.
pub struct Import<C> {
    source: Arc<Map<C>>,
    target: Arc<Map<C>>,
    num_same: usize,
    permute_to_lids: Vec<Lid>,
    permute_from_lids: Vec<Lid>,
    remote_lids: Vec<Lid>,
    remote_pids: Vec<usize>,
    export_lids: Vec<Lid>,
    export_pids: Vec<usize>,
    distributor: Arc<Distributor<C>>,
    config: ImportConfig,
    reversed: bool,
}

impl<C> Clone for Import<C> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            num_same: self.num_same,
            permute_to_lids: self.permute_to_lids.clone(),
            permute_from_lids: self.permute_from_lids.clone(),
            remote_lids: self.remote_lids.clone(),
            remote_pids: self.remote_pids.clone(),
            export_lids: self.export_lids.clone(),
            export_pids: self.export_pids.clone(),
            distributor: Arc::clone(&self.distributor),
            config: self.config,
            reversed: self.reversed,
        }
    }
}

impl<C> fmt::Debug for Import<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("num_same", &self.num_same)
            .field("permute_to_lids", &self.permute_to_lids)
            .field("permute_from_lids", &self.permute_from_lids)
            .field("remote_lids", &self.remote_lids)
            .field("remote_pids", &self.remote_pids)
            .field("export_lids", &self.export_lids)
            .field("export_pids", &self.export_pids)
            .field("distributor", &self.distributor)
            .field("reversed", &self.reversed)
            .finish()
    }
}

impl<C: Communicator> Import<C> {
    /// Plan from `source` to `target` with default options (collective).
    pub fn new(source: Arc<Map<C>>, target: Arc<Map<C>>) -> Result<Self, ImportError> {
        Self::with_config(source, target, ImportConfig::default())
    }

    /// Plan from `source` to `target` (collective).
    ///
    /// If the source map is not distributed no communication happens and
    /// target GIDs missing from the local source are dropped with a warning.
    pub fn with_config(
        source: Arc<Map<C>>,
        target: Arc<Map<C>>,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        let me = source.comm().rank();
        let cls = classify(&source, &target);
        if config.debug {
            log::debug!(
                "{me}: Import ctor: classified {} same, {} permute, {} remote",
                cls.num_same,
                cls.num_permutes(),
                cls.num_remotes()
            );
        }

        if !source.is_distributed() {
            if cls.num_remotes() > 0 {
                log::warn!(
                    "{me}: Import ctor: target has {} remote LIDs but the source map is not \
                     distributed; importing a submap of the source map",
                    cls.num_remotes()
                );
            }
            let distributor = Distributor::empty(Arc::clone(source.comm()));
            return Ok(Self::assemble(
                source,
                target,
                cls.num_same,
                cls.permute_to_lids,
                cls.permute_from_lids,
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                distributor,
                config,
            )
            .ready());
        }

        let resolved = resolve_remote_owners(&source, cls.remote_gids, cls.remote_lids, &config)?;
        if config.debug {
            log::debug!(
                "{me}: Import ctor: resolved owners of {} remote GIDs",
                resolved.remote_gids.len()
            );
        }
        let exports = build_export_plan(&source, &resolved.remote_gids, &resolved.remote_pids)?;
        if config.debug {
            log::debug!(
                "{me}: Import ctor: {} exports to ranks {:?}",
                exports.export_lids.len(),
                exports.distributor.images_to()
            );
        }

        Ok(Self::assemble(
            source,
            target,
            cls.num_same,
            cls.permute_to_lids,
            cls.permute_from_lids,
            resolved.remote_lids,
            resolved.remote_pids,
            exports.export_lids,
            exports.export_pids,
            exports.distributor,
            config,
        )
        .ready())
    }

    /// Plan with the owner of every remote target entry supplied by the
    /// caller; skips the directory lookup (collective).
    ///
    /// `remote_pids[i]` is the owner of the `i`-th remote entry in target
    /// LID order.
    pub fn with_remote_pids(
        source: Arc<Map<C>>,
        target: Arc<Map<C>>,
        remote_pids: Vec<usize>,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        let cls = classify(&source, &target);
        if remote_pids.len() != cls.num_remotes() {
            return Err(ImportError::LengthMismatch {
                what: "user remote PIDs vs remote target entries",
                left: remote_pids.len(),
                right: cls.num_remotes(),
            });
        }
        let (mut pids, mut gids, mut lids) = (remote_pids, cls.remote_gids, cls.remote_lids);
        sort3(&mut pids, &mut gids, &mut lids)?;
        let exports = build_export_plan(&source, &gids, &pids)?;
        Ok(Self::assemble(
            source,
            target,
            cls.num_same,
            cls.permute_to_lids,
            cls.permute_from_lids,
            lids,
            pids,
            exports.export_lids,
            exports.export_pids,
            exports.distributor,
            config,
        )
        .ready())
    }

    /// Plan whose remote owners and exports are all known to the caller.
    /// No communication.
    pub fn with_user_exports(
        source: Arc<Map<C>>,
        target: Arc<Map<C>>,
        user: UserExports,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        let cls = classify(&source, &target);
        if user.remote_pids.len() != cls.num_remotes() {
            return Err(ImportError::LengthMismatch {
                what: "user remote PIDs vs remote target entries",
                left: user.remote_pids.len(),
                right: cls.num_remotes(),
            });
        }
        if user.export_lids.len() != user.export_pids.len() {
            return Err(ImportError::LengthMismatch {
                what: "user export LIDs vs export PIDs",
                left: user.export_lids.len(),
                right: user.export_pids.len(),
            });
        }
        let n_src = source.num_local_elements();
        if let Some(&lid) = user.export_lids.iter().find(|&&l| l >= n_src) {
            return Err(ImportError::LidOutOfRange {
                what: "export",
                lid,
                len: n_src,
            });
        }
        let (mut pids, mut gids, mut lids) = (user.remote_pids, cls.remote_gids, cls.remote_lids);
        sort3(&mut pids, &mut gids, &mut lids)?;
        let distributor = Distributor::create_from_sends_and_recvs(
            Arc::clone(source.comm()),
            &user.export_pids,
            &pids,
        )?;
        Ok(Self::assemble(
            source,
            target,
            cls.num_same,
            cls.permute_to_lids,
            cls.permute_from_lids,
            lids,
            pids,
            user.export_lids,
            user.export_pids,
            distributor,
            config,
        )
        .ready())
    }

    /// Adopt precomputed arrays (no communication).
    ///
    /// Array lengths are cross-checked against each other, the maps and the
    /// distributor; full invariants are checked in debug builds.
    pub fn from_parts(
        source: Arc<Map<C>>,
        target: Arc<Map<C>>,
        parts: ImportParts<C>,
        config: ImportConfig,
    ) -> Result<Self, ImportError> {
        let n_tgt = target.num_local_elements();
        let n_src = source.num_local_elements();
        if parts.num_same > n_tgt.min(n_src) {
            return Err(ImportError::LidOutOfRange {
                what: "same-prefix end",
                lid: parts.num_same,
                len: n_tgt.min(n_src),
            });
        }
        check_len("permute-to vs permute-from LIDs", &parts.permute_to_lids, &parts.permute_from_lids)?;
        check_len("export LIDs vs export PIDs", &parts.export_lids, &parts.export_pids)?;
        check_range("permute-to", &parts.permute_to_lids, n_tgt)?;
        check_range("permute-from", &parts.permute_from_lids, n_src)?;
        check_range("remote", &parts.remote_lids, n_tgt)?;
        check_range("export", &parts.export_lids, n_src)?;

        let remote_pids = parts.distributor.remote_pids();
        if remote_pids.len() != parts.remote_lids.len() {
            return Err(ImportError::LengthMismatch {
                what: "remote LIDs vs distributor receive length",
                left: parts.remote_lids.len(),
                right: remote_pids.len(),
            });
        }
        if parts.export_lids.len() != parts.distributor.total_send_length() {
            return Err(ImportError::LengthMismatch {
                what: "export LIDs vs distributor send length",
                left: parts.export_lids.len(),
                right: parts.distributor.total_send_length(),
            });
        }

        let plan = Self::assemble(
            source,
            target,
            parts.num_same,
            parts.permute_to_lids,
            parts.permute_from_lids,
            parts.remote_lids,
            remote_pids,
            parts.export_lids,
            parts.export_pids,
            parts.distributor,
            config,
        );
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        plan.validate_invariants()?;
        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        source: Arc<Map<C>>,
        target: Arc<Map<C>>,
        num_same: usize,
        permute_to_lids: Vec<Lid>,
        permute_from_lids: Vec<Lid>,
        remote_lids: Vec<Lid>,
        remote_pids: Vec<usize>,
        export_lids: Vec<Lid>,
        export_pids: Vec<usize>,
        distributor: Distributor<C>,
        config: ImportConfig,
    ) -> Self {
        Self {
            source,
            target,
            num_same,
            permute_to_lids,
            permute_from_lids,
            remote_lids,
            remote_pids,
            export_lids,
            export_pids,
            distributor: Arc::new(distributor),
            config,
            reversed: false,
        }
    }

    /// Panics on a violated invariant when checking is enabled.
    fn ready(self) -> Self {
        self.debug_assert_invariants();
        self
    }

    /// Entries copied in place: the common prefix of both element lists.
    pub fn num_same_ids(&self) -> usize {
        self.num_same
    }

    pub fn num_permute_ids(&self) -> usize {
        self.permute_to_lids.len()
    }

    /// Source LIDs of permuted entries, parallel to
    /// [`permute_to_lids`](Self::permute_to_lids).
    pub fn permute_from_lids(&self) -> &[Lid] {
        &self.permute_from_lids
    }

    pub fn permute_to_lids(&self) -> &[Lid] {
        &self.permute_to_lids
    }

    pub fn num_remote_ids(&self) -> usize {
        self.remote_lids.len()
    }

    /// Target LIDs received from other ranks, grouped by owner.
    pub fn remote_lids(&self) -> &[Lid] {
        &self.remote_lids
    }

    /// Owner of each entry of [`remote_lids`](Self::remote_lids), ascending.
    pub fn remote_pids(&self) -> &[usize] {
        &self.remote_pids
    }

    /// GIDs of the remote entries, recovered from the target map.
    pub fn remote_gids(&self) -> Vec<Gid> {
        self.remote_lids
            .iter()
            .filter_map(|&lid| self.target.global_element(lid))
            .collect()
    }

    pub fn num_export_ids(&self) -> usize {
        self.export_lids.len()
    }

    /// Source LIDs sent to other ranks, parallel to
    /// [`export_pids`](Self::export_pids).
    pub fn export_lids(&self) -> &[Lid] {
        &self.export_lids
    }

    pub fn export_pids(&self) -> &[usize] {
        &self.export_pids
    }

    pub fn source_map(&self) -> &Arc<Map<C>> {
        &self.source
    }

    pub fn target_map(&self) -> &Arc<Map<C>> {
        &self.target
    }

    pub fn distributor(&self) -> &Arc<Distributor<C>> {
        &self.distributor
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// True for a plan produced by [`reverse`](Self::reverse) an odd number
    /// of times.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }
}

fn check_len<A, B>(what: &'static str, left: &[A], right: &[B]) -> Result<(), ImportError> {
    if left.len() != right.len() {
        return Err(ImportError::LengthMismatch {
            what,
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(())
}

fn check_range(what: &'static str, lids: &[Lid], len: usize) -> Result<(), ImportError> {
    match lids.iter().find(|&&l| l >= len) {
        Some(&lid) => Err(ImportError::LidOutOfRange { what, lid, len }),
        None => Ok(()),
    }
}

impl<C: Communicator> DebugInvariants for Import<C> {
    /// Local checks: array lengths, LID ranges, the same prefix,
    /// permute GID agreement and, for forward plans, that same, permute and
    /// remote target LIDs are disjoint and remote GIDs are absent from the
    /// local source.
    fn validate_invariants(&self) -> Result<(), ImportError> {
        let src = self.source.element_list();
        let tgt = self.target.element_list();

        check_len("permute-to vs permute-from LIDs", &self.permute_to_lids, &self.permute_from_lids)?;
        check_len("remote LIDs vs remote PIDs", &self.remote_lids, &self.remote_pids)?;
        check_len("export LIDs vs export PIDs", &self.export_lids, &self.export_pids)?;
        check_range("permute-to", &self.permute_to_lids, tgt.len())?;
        check_range("permute-from", &self.permute_from_lids, src.len())?;
        check_range("remote", &self.remote_lids, tgt.len())?;
        check_range("export", &self.export_lids, src.len())?;
        if self.distributor.total_receive_length() != self.remote_lids.len() {
            return Err(ImportError::Internal(format!(
                "distributor receives {} items for {} remote LIDs",
                self.distributor.total_receive_length(),
                self.remote_lids.len()
            )));
        }
        if self.distributor.total_send_length() != self.export_lids.len() {
            return Err(ImportError::Internal(format!(
                "distributor sends {} items for {} export LIDs",
                self.distributor.total_send_length(),
                self.export_lids.len()
            )));
        }

        if self.num_same > src.len().min(tgt.len()) || src[..self.num_same] != tgt[..self.num_same] {
            return Err(ImportError::Internal(format!(
                "same prefix of length {} does not match both element lists",
                self.num_same
            )));
        }
        for (&to, &from) in self.permute_to_lids.iter().zip(&self.permute_from_lids) {
            if tgt[to] != src[from] {
                return Err(ImportError::Internal(format!(
                    "permute pair ({from} -> {to}) moves GID {} into slot holding {}",
                    src[from], tgt[to]
                )));
            }
        }

        if self.reversed {
            return Ok(());
        }
        let mut seen = vec![false; tgt.len()];
        seen[..self.num_same].fill(true);
        for &lid in self.permute_to_lids.iter().chain(&self.remote_lids) {
            if std::mem::replace(&mut seen[lid], true) {
                return Err(ImportError::Internal(format!(
                    "target LID {lid} is classified more than once"
                )));
            }
        }
        for &lid in &self.remote_lids {
            if self.source.is_node_global_element(tgt[lid]) {
                return Err(ImportError::Internal(format!(
                    "remote target LID {lid} (GID {}) is present in the local source map",
                    tgt[lid]
                )));
            }
        }
        Ok(())
    }
}

impl<C: Communicator> fmt::Display for Import<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.reversed { "Import (reverse)" } else { "Import" };
        writeln!(f, "{kind} on rank {}:", self.source.comm().rank())?;
        writeln!(f, "  num same IDs:    {}", self.num_same)?;
        writeln!(f, "  num permute IDs: {}", self.num_permute_ids())?;
        writeln!(f, "  num remote IDs:  {}", self.num_remote_ids())?;
        writeln!(f, "  num export IDs:  {}", self.num_export_ids())?;
        writeln!(f, "  images to:       {:?}", self.distributor.images_to())?;
        write!(f, "  images from:     {:?}", self.distributor.images_from())
    }
}
