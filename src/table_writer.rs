//! 列存表写入器
//!
//! 每次 `write_columns` / `write_batch` 产生一个 block：每列编码成一页，
//! 同时记录 ZoneMap 与（可选）BloomFilter。`finish` 写 Footer 后才把
//! `<path>.partial` 重命名为最终文件；未 `finish` 的写入器在 drop 时删除临时文件。

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::batch::RowBatch;
use crate::common::{HistError, Result};
use crate::footer::{BlockMeta, ChunkMeta, TableFooter, HEADER_LEN, MAGIC, VERSION};
use crate::index::{BloomFilter, ZoneMap};
use crate::page::build_page;
use crate::schema::TableSchema;

/// 接收满批（或最后一个不满的批）的下游
pub trait BatchSink {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()>;
}

/// `finish` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub rows:   u64,
    pub blocks: usize,
    pub bytes:  u64,
}

pub struct TableWriter {
    schema:       TableSchema,
    path:         PathBuf,
    partial_path: PathBuf,
    out:          Option<BufWriter<File>>,
    pos:          u64,
    num_rows:     u64,
    blocks:       Vec<BlockMeta>,
}

impl TableWriter {
    pub fn create(path: impl AsRef<Path>, schema: TableSchema) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut partial: OsString = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial_path = PathBuf::from(partial);

        let mut out = BufWriter::new(File::create(&partial_path)?);
        out.write_all(MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;

        debug!(path = %path.display(), columns = schema.num_columns(), "created table writer");
        Ok(Self {
            schema, path, partial_path,
            out: Some(out),
            pos: HEADER_LEN as u64,
            num_rows: 0,
            blocks: Vec::new(),
        })
    }

    pub fn schema(&self)     -> &TableSchema { &self.schema }
    pub fn num_rows(&self)   -> u64          { self.num_rows }
    pub fn num_blocks(&self) -> usize        { self.blocks.len() }

    /// 追加一个 block；`columns` 与 schema 一一对应且等长。空输入不产生 block。
    pub fn write_columns(&mut self, columns: &[&[u32]]) -> Result<()> {
        if columns.len() != self.schema.num_columns() {
            return Err(HistError::SchemaMismatch(format!(
                "expected {} columns, got {}", self.schema.num_columns(), columns.len()
            )));
        }
        let rows = columns.first().map_or(0, |c| c.len());
        if columns.iter().any(|c| c.len() != rows) {
            return Err(HistError::SchemaMismatch("columns have different lengths".into()));
        }
        if rows == 0 {
            return Ok(());
        }
        let num_rows = u32::try_from(rows)
            .map_err(|_| HistError::SchemaMismatch(format!("block of {rows} rows is too large")))?;

        // 先编码整个 block，避免半个 block 落盘
        let pages = self.schema.columns.iter().zip(columns)
            .map(|(meta, values)| build_page(values, meta))
            .collect::<Result<Vec<_>>>()?;

        let out = self.out.as_mut()
            .ok_or_else(|| HistError::TableFormat("writer already finished".into()))?;

        let mut chunks = Vec::with_capacity(columns.len());
        for ((meta, values), page) in self.schema.columns.iter().zip(columns).zip(&pages) {
            let len = u32::try_from(page.len())
                .map_err(|_| HistError::Encoding(format!("page of {} bytes", page.len())))?;
            out.write_all(page)?;

            chunks.push(ChunkMeta {
                offset:   self.pos,
                len,
                // rows > 0，必有 min/max
                zone_map: ZoneMap::from_values(values).unwrap_or(ZoneMap { min: 0, max: 0 }),
                bloom:    meta.bloom_filter.then(|| BloomFilter::from_values(values)),
            });
            self.pos += len as u64;
        }

        debug!(block = self.blocks.len(), first_row = self.num_rows, rows, "wrote block");
        self.blocks.push(BlockMeta { first_row: self.num_rows, num_rows, chunks });
        self.num_rows += rows as u64;
        Ok(())
    }

    /// 写 Footer、落盘并重命名为最终路径
    pub fn finish(mut self) -> Result<TableSummary> {
        let mut out = self.out.take()
            .ok_or_else(|| HistError::TableFormat("writer already finished".into()))?;

        let footer = TableFooter {
            num_rows: self.num_rows,
            schema:   self.schema.clone(),
            blocks:   std::mem::take(&mut self.blocks),
        };
        let footer_bytes = footer.serialize()?;
        let footer_len = u32::try_from(footer_bytes.len())
            .map_err(|_| HistError::TableFormat("footer too large".into()))?;

        out.write_all(&footer_bytes)?;
        out.write_all(&crc32fast::hash(&footer_bytes).to_le_bytes())?;
        out.write_all(&footer_len.to_le_bytes())?;
        out.write_all(MAGIC)?;
        let bytes = self.pos + footer_bytes.len() as u64 + 16;

        let file = out.into_inner().map_err(|e| HistError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.partial_path, &self.path)?;

        let summary = TableSummary { rows: footer.num_rows, blocks: footer.blocks.len(), bytes };
        info!(
            path = %self.path.display(),
            rows = summary.rows, blocks = summary.blocks, bytes,
            "table written"
        );
        Ok(summary)
    }
}

impl BatchSink for TableWriter {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        self.write_columns(&batch.columns())
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        // finish 成功后 partial 已被重命名；否则丢弃未完成的文件
        if self.partial_path.exists() {
            self.out.take();
            if let Err(e) = fs::remove_file(&self.partial_path) {
                warn!(path = %self.partial_path.display(), error = %e, "failed to remove partial table");
            }
        }
    }
}
