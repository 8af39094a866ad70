//! Fixed little-endian wire types for plan-construction traffic.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

use crate::Gid;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Decode a received byte buffer into owned records.
///
/// Copies instead of casting in place because the received `Vec<u8>` carries
/// no alignment guarantee for `T`.
pub fn records_from_bytes<T: Pod>(raw: &[u8]) -> Vec<T> {
    let n = raw.len() / size_of::<T>();
    let mut out = vec![T::zeroed(); n];
    cast_slice_mut(&mut out).copy_from_slice(&raw[..n * size_of::<T>()]);
    out
}

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64, // count of following records
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// A global identifier carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGid {
    pub gid_le: i64,
}
impl WireGid {
    pub fn of(gid: Gid) -> Self {
        Self { gid_le: gid.to_le() }
    }
    pub fn get(&self) -> Gid {
        i64::from_le(self.gid_le)
    }
}

/// A `(gid, rank)` pair: directory registrations and lookup replies.
/// NOTE: `rank_le` is u64 (never usize) on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGidRank {
    pub gid_le: i64,
    pub rank_le: u64,
}
impl WireGidRank {
    pub const SIZE: usize = 16;
    /// Rank value meaning "no owner".
    pub const NO_RANK: u64 = u64::MAX;

    pub fn new(gid: Gid, rank: Option<usize>) -> Self {
        let rank = rank.map_or(Self::NO_RANK, |r| r as u64);
        Self {
            gid_le: gid.to_le(),
            rank_le: rank.to_le(),
        }
    }
    pub fn gid(&self) -> Gid {
        i64::from_le(self.gid_le)
    }
    pub fn rank(&self) -> Option<usize> {
        match u64::from_le(self.rank_le) {
            Self::NO_RANK => None,
            r => Some(r as usize),
        }
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireCount>() == 8);
    assert!(size_of::<WireGid>() == 8);
    assert!(size_of::<WireGidRank>() == WireGidRank::SIZE);
    assert!(align_of::<WireGidRank>() == 8);
};
