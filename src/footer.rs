//! 列存表文件格式与 Footer
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC  (8 bytes) "HISTCOL\0"      │
//! │  Version(4 bytes) = 1              │
//! ├────────────────────────────────────┤
//! │  DATA REGION                       │
//! │    block 0: [page col 0]..[col N]  │ ← 编码 + LZ4 + CRC
//! │    block 1: ...                    │
//! ├────────────────────────────────────┤
//! │  FOOTER                            │
//! │    num_rows u64                    │
//! │    schema (列名/类型/编码/压缩)      │
//! │    num_blocks u32                  │
//! │    BlockMeta × num_blocks          │
//! │      first_row u64, num_rows u32   │
//! │      per column: offset u64        │
//! │        len u32, min u32, max u32   │
//! │        [BloomFilter]               │
//! │  Footer CRC32  (4 bytes)           │
//! │  Footer length (4 bytes)           │
//! │  MAGIC         (8 bytes)           │
//! └────────────────────────────────────┘
//! ```

use std::io::{ErrorKind, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{HistError, Result};
use crate::field_type::{ColumnMeta, CompressionType, EncodingType, FieldType};
use crate::index::{BloomFilter, ZoneMap};
use crate::schema::TableSchema;

pub const MAGIC: &[u8; 8]     = b"HISTCOL\0";
pub const VERSION: u32        = 1;
pub const HEADER_LEN: usize   = 12;
/// footer CRC + footer length + MAGIC
pub const TRAILER_LEN: usize  = 16;

// ── Footer 结构 ───────────────────────────────────────────────────────────────

/// 一个 block 中一列的页位置与剪枝统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub offset:   u64,
    pub len:      u32,
    pub zone_map: ZoneMap,
    pub bloom:    Option<BloomFilter>,
}

/// 一个 block = 写端一次 flush 的行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    pub first_row: u64,
    pub num_rows:  u32,
    pub chunks:    Vec<ChunkMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFooter {
    pub num_rows: u64,
    pub schema:   TableSchema,
    pub blocks:   Vec<BlockMeta>,
}

impl TableFooter {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u64::<LittleEndian>(self.num_rows)?;

        out.write_u32::<LittleEndian>(self.schema.num_columns() as u32)?;
        for col in &self.schema.columns {
            let name = col.name.as_bytes();
            let name_len = u16::try_from(name.len())
                .map_err(|_| HistError::SchemaMismatch(format!("column name too long: {}", col.name)))?;
            out.write_u16::<LittleEndian>(name_len)?;
            out.extend_from_slice(name);
            out.write_u8(col.field_type.tag())?;
            out.write_u8(col.encoding.tag())?;
            out.write_u8(col.compression.tag())?;
            out.write_u8(col.bloom_filter as u8)?;
        }

        out.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            out.write_u64::<LittleEndian>(block.first_row)?;
            out.write_u32::<LittleEndian>(block.num_rows)?;
            for chunk in &block.chunks {
                out.write_u64::<LittleEndian>(chunk.offset)?;
                out.write_u32::<LittleEndian>(chunk.len)?;
                out.write_u32::<LittleEndian>(chunk.zone_map.min)?;
                out.write_u32::<LittleEndian>(chunk.zone_map.max)?;
                if let Some(bf) = &chunk.bloom {
                    bf.serialize_into(&mut out)?;
                }
            }
        }
        Ok(out)
    }

    pub fn deserialize(mut data: &[u8]) -> Result<Self> {
        let footer = Self::read_from(&mut data).map_err(|e| match e {
            HistError::Io(io) if io.kind() == ErrorKind::UnexpectedEof =>
                HistError::TableFormat("truncated footer".into()),
            other => other,
        })?;
        if !data.is_empty() {
            return Err(HistError::TableFormat(format!("{} trailing footer bytes", data.len())));
        }
        Ok(footer)
    }

    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let num_rows = r.read_u64::<LittleEndian>()?;

        let num_columns = r.read_u32::<LittleEndian>()? as usize;
        let mut columns = Vec::with_capacity(num_columns.min(64));
        for _ in 0..num_columns {
            let name_len = r.read_u16::<LittleEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            r.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| HistError::TableFormat("column name is not UTF-8".into()))?;
            let field_type  = FieldType::from_tag(r.read_u8()?)?;
            let encoding    = EncodingType::from_tag(r.read_u8()?)?;
            let compression = CompressionType::from_tag(r.read_u8()?)?;
            let bloom       = r.read_u8()? != 0;

            let mut meta = ColumnMeta::new(&name, field_type)
                .with_encoding(encoding)
                .with_compression(compression);
            meta.bloom_filter = bloom;
            columns.push(meta);
        }
        let schema = TableSchema::new(columns);

        let num_blocks = r.read_u32::<LittleEndian>()? as usize;
        let mut blocks = Vec::with_capacity(num_blocks.min(1 << 16));
        for _ in 0..num_blocks {
            let first_row = r.read_u64::<LittleEndian>()?;
            let block_rows = r.read_u32::<LittleEndian>()?;
            let mut chunks = Vec::with_capacity(num_columns);
            for col in &schema.columns {
                let offset = r.read_u64::<LittleEndian>()?;
                let len    = r.read_u32::<LittleEndian>()?;
                let min    = r.read_u32::<LittleEndian>()?;
                let max    = r.read_u32::<LittleEndian>()?;
                let bloom = if col.bloom_filter {
                    Some(BloomFilter::deserialize_from(r)?)
                } else {
                    None
                };
                chunks.push(ChunkMeta { offset, len, zone_map: ZoneMap { min, max }, bloom });
            }
            blocks.push(BlockMeta { first_row, num_rows: block_rows, chunks });
        }

        Ok(Self { num_rows, schema, blocks })
    }

    /// 行号连续、块行数之和等于总行数
    pub fn validate(&self) -> Result<()> {
        let mut next_row = 0u64;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.first_row != next_row || block.num_rows == 0 {
                return Err(HistError::TableFormat(format!("block {i} has inconsistent row range")));
            }
            if block.chunks.iter().any(|c| c.zone_map.min > c.zone_map.max) {
                return Err(HistError::TableFormat(format!("block {i} has an inverted zone map")));
            }
            next_row += block.num_rows as u64;
        }
        if next_row != self.num_rows {
            return Err(HistError::TableFormat(format!(
                "blocks hold {next_row} rows, footer says {}", self.num_rows
            )));
        }
        Ok(())
    }
}
