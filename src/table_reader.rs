//! 列存表读取器与带谓词下推的批量扫描
//!
//! 扫描流程（每个 block）：
//! 1. `BoundPredicate::can_skip` 用 ZoneMap / BloomFilter 剪枝整块
//! 2. 只解码谓词列，细化选择向量
//! 3. 选择向量非空时才解码投影列，按行号 gather 到 [`ColumnBatch`]

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::batch::ColumnBatch;
use crate::buffer::ByteSource;
use crate::common::{HistError, Result};
use crate::footer::{BlockMeta, TableFooter, HEADER_LEN, MAGIC, TRAILER_LEN, VERSION};
use crate::page::decode_page;
use crate::predicate::{BoundPredicate, Predicate};
use crate::schema::TableSchema;

// ── TableReader ───────────────────────────────────────────────────────────────

/// 打开后不可变；多个扫描可以同时借用同一个读取器
#[derive(Debug)]
pub struct TableReader {
    bytes:  ByteSource,
    footer: TableFooter,
}

impl TableReader {
    /// 内存映射打开表文件，校验 magic / footer CRC / 页范围
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Self::parse(ByteSource::map_file(path)?)?;
        debug!(
            path = %path.display(),
            rows = reader.num_rows(), blocks = reader.num_blocks(),
            "opened table"
        );
        Ok(reader)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::parse(ByteSource::Owned(bytes))
    }

    fn parse(bytes: ByteSource) -> Result<Self> {
        let data = bytes.as_slice();
        let n = data.len();
        if n < HEADER_LEN + TRAILER_LEN {
            return Err(HistError::TableFormat(format!("{n} bytes is too short for a table")));
        }
        if &data[0..8] != MAGIC || &data[n - 8..] != MAGIC {
            return Err(HistError::TableFormat("bad magic".into()));
        }
        let version = LittleEndian::read_u32(&data[8..12]);
        if version != VERSION {
            return Err(HistError::TableFormat(format!("unsupported version {version}")));
        }

        let footer_len = LittleEndian::read_u32(&data[n - 12..n - 8]) as usize;
        let footer_crc = LittleEndian::read_u32(&data[n - 16..n - 12]);
        let footer_start = (n - TRAILER_LEN).checked_sub(footer_len)
            .filter(|&s| s >= HEADER_LEN)
            .ok_or_else(|| HistError::TableFormat(format!("footer length {footer_len} out of range")))?;
        let footer_bytes = &data[footer_start..n - TRAILER_LEN];
        if crc32fast::hash(footer_bytes) != footer_crc {
            return Err(HistError::ChecksumMismatch);
        }

        let footer = TableFooter::deserialize(footer_bytes)?;
        footer.validate()?;
        for (b, block) in footer.blocks.iter().enumerate() {
            for chunk in &block.chunks {
                let end = chunk.offset.checked_add(chunk.len as u64);
                if chunk.offset < HEADER_LEN as u64 || end.map_or(true, |e| e > footer_start as u64) {
                    return Err(HistError::TableFormat(format!("block {b}: page outside data region")));
                }
            }
        }

        Ok(Self { bytes, footer })
    }

    pub fn schema(&self)     -> &TableSchema { &self.footer.schema }
    pub fn num_rows(&self)   -> u64          { self.footer.num_rows }
    pub fn num_blocks(&self) -> usize        { self.footer.blocks.len() }
    pub fn blocks(&self)     -> &[BlockMeta] { &self.footer.blocks }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.footer.schema.column_index(name)
    }

    fn decode_chunk(&self, block: &BlockMeta, col: usize, out: &mut Vec<u32>) -> Result<()> {
        let chunk = &block.chunks[col];
        let start = chunk.offset as usize;
        let page  = &self.bytes.as_slice()[start..start + chunk.len as usize];
        out.clear();
        decode_page(page, &self.footer.schema.columns[col], block.num_rows as usize, out)
    }

    /// 读出整列（不经过谓词）
    pub fn read_column(&self, name: &str) -> Result<Vec<u32>> {
        let col = self.column_index(name)?;
        let mut all = Vec::with_capacity(self.num_rows() as usize);
        let mut buf = Vec::new();
        for block in &self.footer.blocks {
            self.decode_chunk(block, col, &mut buf)?;
            all.extend_from_slice(&buf);
        }
        Ok(all)
    }

    /// 建立带谓词下推的扫描；`projection` 决定 [`ColumnBatch`] 的列顺序
    pub fn scan(&self, projection: &[&str], predicate: &Predicate) -> Result<TableScan<'_>> {
        let projection = projection.iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>>>()?;
        let predicate = predicate.bind(self.schema())?;
        let predicate_columns = predicate.columns();
        let num_columns = self.schema().num_columns();

        Ok(TableScan {
            reader: self,
            predicate,
            projection,
            predicate_columns,
            next_block: 0,
            decoded:   vec![Vec::new(); num_columns],
            loaded:    vec![false; num_columns],
            selection: Vec::new(),
            stats:     ScanStats::default(),
        })
    }
}

// ── TableScan ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub blocks_total:  usize,
    pub blocks_pruned: usize,
    /// 解码过谓词列的行数
    pub rows_scanned:  u64,
    pub rows_matched:  u64,
}

pub struct TableScan<'r> {
    reader:            &'r TableReader,
    predicate:         BoundPredicate,
    projection:        Vec<usize>,
    predicate_columns: Vec<usize>,
    next_block:        usize,
    // 按列序号索引的解码缓冲，跨 block 复用
    decoded:           Vec<Vec<u32>>,
    loaded:            Vec<bool>,
    selection:         Vec<u32>,
    stats:             ScanStats,
}

impl<'r> TableScan<'r> {
    /// 填充下一批匹配行；扫描结束返回 `false`（此时 `batch` 为空）
    pub fn next_batch(&mut self, batch: &mut ColumnBatch) -> Result<bool> {
        batch.reset(self.projection.len());
        let reader = self.reader;
        let blocks = reader.blocks();

        while self.next_block < blocks.len() {
            let block = &blocks[self.next_block];
            self.next_block += 1;
            self.stats.blocks_total += 1;

            if self.predicate.can_skip(block) {
                self.stats.blocks_pruned += 1;
                continue;
            }

            self.loaded.iter_mut().for_each(|l| *l = false);
            for &col in &self.predicate_columns {
                reader.decode_chunk(block, col, &mut self.decoded[col])?;
                self.loaded[col] = true;
            }

            self.selection.clear();
            self.selection.extend(0..block.num_rows);
            self.predicate.refine(&self.decoded, &mut self.selection);
            self.stats.rows_scanned += block.num_rows as u64;
            if self.selection.is_empty() {
                continue;
            }

            for (pos, &col) in self.projection.iter().enumerate() {
                if !self.loaded[col] {
                    reader.decode_chunk(block, col, &mut self.decoded[col])?;
                    self.loaded[col] = true;
                }
                let src = &self.decoded[col];
                batch.column_mut(pos).extend(self.selection.iter().map(|&r| src[r as usize]));
            }
            self.stats.rows_matched += self.selection.len() as u64;
            return Ok(true);
        }

        debug!(
            blocks = self.stats.blocks_total,
            pruned = self.stats.blocks_pruned,
            scanned = self.stats.rows_scanned,
            matched = self.stats.rows_matched,
            "scan finished"
        );
        Ok(false)
    }

    pub fn stats(&self) -> ScanStats { self.stats }
}
