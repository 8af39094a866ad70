//! Split target entries into same, permuted and remote.

use crate::algs::communicator::Communicator;
use crate::data::map::Map;
use crate::{Gid, Lid};

/// Output of [`classify`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    /// Length of the common prefix of source and target element lists.
    pub num_same: usize,
    pub permute_to_lids: Vec<Lid>,
    pub permute_from_lids: Vec<Lid>,
    /// Target LIDs whose GIDs are not in the local source map.
    pub remote_lids: Vec<Lid>,
    pub remote_gids: Vec<Gid>,
}

impl Classification {
    pub fn num_permutes(&self) -> usize {
        self.permute_to_lids.len()
    }

    pub fn num_remotes(&self) -> usize {
        self.remote_lids.len()
    }
}

/// Classify every target LID against the local source map. No communication.
///
/// Order is preserved: permute and remote lists are ascending in target LID.
pub fn classify<C: Communicator>(source: &Map<C>, target: &Map<C>) -> Classification {
    let src = source.element_list();
    let tgt = target.element_list();
    let num_same = src.iter().zip(tgt).take_while(|(s, t)| s == t).count();

    let tail = &tgt[num_same..];
    let found = lookup_tail(source, tail);

    let mut out = Classification {
        num_same,
        ..Classification::default()
    };
    for (offset, (&gid, src_lid)) in tail.iter().zip(found).enumerate() {
        let tgt_lid = num_same + offset;
        match src_lid {
            Some(from) => {
                out.permute_from_lids.push(from);
                out.permute_to_lids.push(tgt_lid);
            }
            None => {
                out.remote_gids.push(gid);
                out.remote_lids.push(tgt_lid);
            }
        }
    }
    out
}

#[cfg(feature = "rayon")]
fn lookup_tail<C: Communicator>(source: &Map<C>, tail: &[Gid]) -> Vec<Option<Lid>> {
    use rayon::prelude::*;
    let table = source.lookup_table();
    tail.par_iter().map(|g| table.get(g).copied()).collect()
}

#[cfg(not(feature = "rayon"))]
fn lookup_tail<C: Communicator>(source: &Map<C>, tail: &[Gid]) -> Vec<Option<Lid>> {
    tail.iter().map(|&g| source.local_element(g)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use std::sync::Arc;

    fn map(gids: &[Gid]) -> Map<NoComm> {
        Map::new(None, gids.to_vec(), 0, Arc::new(NoComm)).unwrap()
    }

    #[test]
    fn empty_target() {
        let c = classify(&map(&[1, 2]), &map(&[]));
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn identical_maps_are_all_same() {
        let m = map(&[5, 6, 7]);
        let c = classify(&m, &m);
        assert_eq!(c.num_same, 3);
        assert_eq!(c.num_permutes() + c.num_remotes(), 0);
    }

    #[test]
    fn swap_gives_two_permutes() {
        let c = classify(&map(&[0, 1, 2, 3, 4]), &map(&[0, 1, 3, 2, 4]));
        assert_eq!(c.num_same, 2);
        assert_eq!(c.permute_to_lids, vec![2, 3, 4]);
        assert_eq!(c.permute_from_lids, vec![3, 2, 4]);
        assert!(c.remote_lids.is_empty());
    }

    #[test]
    fn missing_gids_are_remote_in_order() {
        let c = classify(&map(&[0, 1]), &map(&[0, 9, 1, 8]));
        assert_eq!(c.num_same, 1);
        assert_eq!(c.permute_to_lids, vec![2]);
        assert_eq!(c.permute_from_lids, vec![1]);
        assert_eq!(c.remote_lids, vec![1, 3]);
        assert_eq!(c.remote_gids, vec![9, 8]);
    }
}
