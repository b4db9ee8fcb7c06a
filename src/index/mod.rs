//! Block 级剪枝索引
//!
//! - **ZoneMap**     — 每个 block 每列的 min/max，等值/IN 查询时跳过无关 block
//! - **BloomFilter** — 双哈希位数组，IN 集合中落在 [min,max] 内的值再过一遍

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

use crate::common::{HistError, Result};

// ── Zone Map ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneMap {
    pub min: u32,
    pub max: u32,
}

impl ZoneMap {
    /// 空切片返回 None
    pub fn from_values(values: &[u32]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        Some(Self { min, max })
    }

    pub fn contains(&self, v: u32) -> bool {
        self.min <= v && v <= self.max
    }
}

// ── Bloom Filter ──────────────────────────────────────────────────────────────

const NUM_HASHES: u64 = 7;

/// 双哈希 Bloom Filter（FNV-1a 变体），约 10 bit / 值，FPP ≈ 1%
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits:     Vec<u8>,
    num_bits: usize,
}

impl BloomFilter {
    pub fn new(expected_ndv: usize) -> Self {
        let num_bits  = (expected_ndv * 10).max(64);
        let num_bytes = num_bits.div_ceil(8);
        Self { bits: vec![0u8; num_bytes], num_bits }
    }

    pub fn from_values(values: &[u32]) -> Self {
        let mut bf = Self::new(values.len());
        for &v in values {
            bf.add(v);
        }
        bf
    }

    fn hashes(value: u32) -> (u64, u64) {
        let mut h1: u64 = 0xcbf29ce484222325;
        let mut h2: u64 = 0x84222325cbf29ce4;
        for b in value.to_le_bytes() {
            h1 ^= b as u64;
            h1 = h1.wrapping_mul(0x100000001b3);
            h2 = h2.rotate_left(5) ^ b as u64;
            h2 = h2.wrapping_mul(0x9e3779b97f4a7c15);
        }
        (h1, h2 | 1)
    }

    fn probe_bits(&self, value: u32) -> impl Iterator<Item = usize> {
        let (h1, h2) = Self::hashes(value);
        let nb = self.num_bits as u64;
        (0..NUM_HASHES).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % nb) as usize)
    }

    pub fn add(&mut self, value: u32) {
        for bit in self.probe_bits(value) {
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn may_contain(&self, value: u32) -> bool {
        self.probe_bits(value).all(|bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<LittleEndian>(self.num_bits as u32)?;
        out.extend_from_slice(&self.bits);
        Ok(())
    }

    pub fn deserialize_from<R: Read>(r: &mut R) -> Result<Self> {
        let num_bits = r.read_u32::<LittleEndian>()? as usize;
        if num_bits == 0 {
            return Err(HistError::TableFormat("bloom filter with zero bits".into()));
        }
        let mut bits = vec![0u8; num_bits.div_ceil(8)];
        r.read_exact(&mut bits)?;
        Ok(Self { bits, num_bits })
    }
}
