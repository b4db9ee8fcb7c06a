//! 交通直方图 tile：只读访问器 + 构建器
//!
//! 文件格式（全部小端）：
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ HEADER (16 B)                                               │
//! │   magic "HTIL" | version u16 | reserved u16                 │
//! │   segment_count u32 | reserved u32                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ SEGMENT DIRECTORY  segment_count × 16 B                     │
//! │   entries_offset u32 | entries_len u32                      │
//! │   next_ids_offset u32 | next_ids_len u32                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ BODY                                                        │
//! │   Entry (8 B): day_hour u8 | next_segment_idx u8            │
//! │                speed_bucket u8 | pad u8 | count u32         │
//! │   next segment id: u32                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! 路段没有显式 ID 字段：它在目录中的位置就是 segment_id。
//! `open` 时一次性校验整个目录，之后的访问器不会越界；
//! `next_segment_idx` 的解析仍按索引做边界检查并返回 `Option`。

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::buffer::ByteSource;
use crate::common::{HistError, Result, SegmentId};

const MAGIC: &[u8; 4]    = b"HTIL";
const VERSION: u16       = 1;
const HEADER_LEN: usize  = 16;
const DIR_ENTRY_LEN: usize = 16;
const ENTRY_LEN: usize   = 8;
const NEXT_ID_LEN: usize = 4;

// ── Entry ─────────────────────────────────────────────────────────────────────

/// 一条统计记录：某时段内，从本路段驶向某个后继路段、落在某速度桶的观测次数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEntry {
    pub day_hour:         u8,
    /// 指向所属路段 next_segment_ids 列表的下标，不是路段 ID
    pub next_segment_idx: u8,
    pub speed_bucket:     u8,
    pub count:            u32,
}

impl TileEntry {
    pub fn new(day_hour: u8, next_segment_idx: u8, speed_bucket: u8, count: u32) -> Self {
        Self { day_hour, next_segment_idx, speed_bucket, count }
    }

    fn decode(b: &[u8]) -> Self {
        Self {
            day_hour:         b[0],
            next_segment_idx: b[1],
            speed_bucket:     b[2],
            count:            LittleEndian::read_u32(&b[4..8]),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.day_hour, self.next_segment_idx, self.speed_bucket, 0]);
        out.extend_from_slice(&self.count.to_le_bytes());
    }
}

// ── 目录 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SegmentDir {
    entries_offset:  usize,
    entries_len:     usize,
    next_ids_offset: usize,
    next_ids_len:    usize,
}

fn check_range(buf_len: usize, offset: usize, len: usize, width: usize) -> bool {
    len.checked_mul(width)
        .and_then(|n| n.checked_add(offset))
        .is_some_and(|end| end <= buf_len)
}

// ── HistogramTile ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HistogramTile {
    bytes:    ByteSource,
    segments: Vec<SegmentDir>,
}

impl HistogramTile {
    /// 内存映射打开 tile 文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tile = Self::parse(ByteSource::map_file(path)?)?;
        debug!(path = %path.display(), segments = tile.num_segments(), "opened tile");
        Ok(tile)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::parse(ByteSource::Owned(bytes))
    }

    fn parse(bytes: ByteSource) -> Result<Self> {
        let data = bytes.as_slice();
        if data.len() < HEADER_LEN {
            return Err(HistError::TileFormat(format!("{} bytes is shorter than the header", data.len())));
        }
        if &data[0..4] != MAGIC {
            return Err(HistError::TileFormat("bad magic".into()));
        }
        let version = LittleEndian::read_u16(&data[4..6]);
        if version != VERSION {
            return Err(HistError::TileFormat(format!("unsupported version {version}")));
        }
        let count = LittleEndian::read_u32(&data[8..12]) as usize;
        if !check_range(data.len(), HEADER_LEN, count, DIR_ENTRY_LEN) {
            return Err(HistError::TileFormat(format!("directory of {count} segments is truncated")));
        }

        let mut segments = Vec::with_capacity(count);
        for (i, raw) in data[HEADER_LEN..HEADER_LEN + count * DIR_ENTRY_LEN]
            .chunks_exact(DIR_ENTRY_LEN)
            .enumerate()
        {
            let dir = SegmentDir {
                entries_offset:  LittleEndian::read_u32(&raw[0..4]) as usize,
                entries_len:     LittleEndian::read_u32(&raw[4..8]) as usize,
                next_ids_offset: LittleEndian::read_u32(&raw[8..12]) as usize,
                next_ids_len:    LittleEndian::read_u32(&raw[12..16]) as usize,
            };
            if !check_range(data.len(), dir.entries_offset, dir.entries_len, ENTRY_LEN) {
                return Err(HistError::TileFormat(format!("segment {i}: entries out of bounds")));
            }
            if !check_range(data.len(), dir.next_ids_offset, dir.next_ids_len, NEXT_ID_LEN) {
                return Err(HistError::TileFormat(format!("segment {i}: next segment ids out of bounds")));
            }
            segments.push(dir);
        }
        Ok(Self { bytes, segments })
    }

    pub fn num_segments(&self) -> usize { self.segments.len() }

    pub fn segment(&self, id: SegmentId) -> Option<TileSegment<'_>> {
        let dir = self.segments.get(id as usize)?;
        Some(TileSegment { id, data: self.bytes.as_slice(), dir })
    }

    /// 按 segment_id 顺序遍历
    pub fn segments(&self) -> impl Iterator<Item = TileSegment<'_>> {
        let data = self.bytes.as_slice();
        self.segments.iter().enumerate()
            .map(move |(i, dir)| TileSegment { id: i as SegmentId, data, dir })
    }

    /// 所有路段的 entry 总数 = 转码后的行数
    pub fn total_entries(&self) -> usize {
        self.segments.iter().map(|d| d.entries_len).sum()
    }
}

// ── TileSegment ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct TileSegment<'t> {
    id:   SegmentId,
    data: &'t [u8],
    dir:  &'t SegmentDir,
}

impl<'t> TileSegment<'t> {
    pub fn id(&self) -> SegmentId { self.id }

    pub fn entries_len(&self) -> usize { self.dir.entries_len }

    pub fn entry(&self, idx: usize) -> Option<TileEntry> {
        if idx >= self.dir.entries_len {
            return None;
        }
        let off = self.dir.entries_offset + idx * ENTRY_LEN;
        Some(TileEntry::decode(&self.data[off..off + ENTRY_LEN]))
    }

    pub fn entries(&self) -> impl Iterator<Item = TileEntry> + 't {
        let data  = self.data;
        let start = self.dir.entries_offset;
        data[start..start + self.dir.entries_len * ENTRY_LEN]
            .chunks_exact(ENTRY_LEN)
            .map(TileEntry::decode)
    }

    pub fn next_segment_ids_len(&self) -> usize { self.dir.next_ids_len }

    /// 解析 entry 的 `next_segment_idx`；越界返回 None
    pub fn next_segment_id(&self, idx: usize) -> Option<SegmentId> {
        if idx >= self.dir.next_ids_len {
            return None;
        }
        let off = self.dir.next_ids_offset + idx * NEXT_ID_LEN;
        Some(LittleEndian::read_u32(&self.data[off..off + NEXT_ID_LEN]))
    }

    pub fn next_segment_ids(&self) -> impl Iterator<Item = SegmentId> + 't {
        let data  = self.data;
        let start = self.dir.next_ids_offset;
        data[start..start + self.dir.next_ids_len * NEXT_ID_LEN]
            .chunks_exact(NEXT_ID_LEN)
            .map(LittleEndian::read_u32)
    }
}

impl std::fmt::Debug for TileSegment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSegment")
            .field("id", &self.id)
            .field("entries", &self.dir.entries_len)
            .field("next_segment_ids", &self.dir.next_ids_len)
            .finish()
    }
}

// ── TileBuilder ───────────────────────────────────────────────────────────────

/// 按 segment_id 顺序追加路段，序列化为 tile 字节。
/// 不校验 `next_segment_idx`，越界由转码阶段报告。
#[derive(Debug, Default)]
pub struct TileBuilder {
    segments: Vec<(Vec<SegmentId>, Vec<TileEntry>)>,
}

impl TileBuilder {
    pub fn new() -> Self { Self::default() }

    /// 追加一个路段，返回它的 segment_id
    pub fn add_segment(
        &mut self,
        next_segment_ids: impl Into<Vec<SegmentId>>,
        entries:          impl Into<Vec<TileEntry>>,
    ) -> SegmentId {
        self.segments.push((next_segment_ids.into(), entries.into()));
        (self.segments.len() - 1) as SegmentId
    }

    pub fn add_empty_segment(&mut self) -> SegmentId {
        self.add_segment(Vec::new(), Vec::new())
    }

    pub fn num_segments(&self) -> usize { self.segments.len() }

    pub fn finish(&self) -> Result<Vec<u8>> {
        let body_len: usize = self.segments.iter()
            .map(|(ids, entries)| ids.len() * NEXT_ID_LEN + entries.len() * ENTRY_LEN)
            .sum();
        let body_start = HEADER_LEN + self.segments.len() * DIR_ENTRY_LEN;
        let total = body_start + body_len;
        if u32::try_from(total).is_err() {
            return Err(HistError::TileFormat(format!("tile of {total} bytes exceeds u32 offsets")));
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(MAGIC);
        out.write_u16::<LittleEndian>(VERSION)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(self.segments.len() as u32)?;
        out.write_u32::<LittleEndian>(0)?;

        let mut pos = body_start;
        for (ids, entries) in &self.segments {
            let entries_offset = pos;
            pos += entries.len() * ENTRY_LEN;
            let ids_offset = pos;
            pos += ids.len() * NEXT_ID_LEN;
            out.write_u32::<LittleEndian>(entries_offset as u32)?;
            out.write_u32::<LittleEndian>(entries.len() as u32)?;
            out.write_u32::<LittleEndian>(ids_offset as u32)?;
            out.write_u32::<LittleEndian>(ids.len() as u32)?;
        }

        for (ids, entries) in &self.segments {
            for e in entries {
                e.encode(&mut out);
            }
            for &id in ids {
                out.write_u32::<LittleEndian>(id)?;
            }
        }
        debug_assert_eq!(out.len(), total);
        Ok(out)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<u64> {
        let bytes = self.finish()?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }
}
