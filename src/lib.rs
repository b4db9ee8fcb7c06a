//! # histogram-columnar
//!
//! 交通直方图 tile → 列存表转码，以及带谓词下推的加权平均速度查询。
//!
//! ## 整体架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HistogramTile (mmap)                                    │
//! │    segment[i] ─┬─ entries[]  (day_hour, next_idx,        │
//! │                │              speed_bucket, count)        │
//! │                └─ next_segment_ids[]                      │
//! │          │                                                │
//! │      Transcoder  ── RowBatch (B 行) ──▶ BatchSink         │
//! │          │                                                │
//! │      TableWriter                                          │
//! │   ┌──────────────────────────────────────────────┐        │
//! │   │  block × N  (一次 flush = 一个 block)          │        │
//! │   │   ├─ page × 6  (Plain/RLE/Delta + LZ4 + CRC)   │        │
//! │   │   ├─ ZoneMap     (每列 min/max)                │        │
//! │   │   └─ BloomFilter (segment_id)                  │        │
//! │   │  Footer (schema + block metas + CRC)           │        │
//! │   └──────────────────────────────────────────────┘        │
//! │          │                                                │
//! │      TableReader::scan(projection, Predicate)             │
//! │          │  block 剪枝 → 谓词列解码 → 选择向量 → 投影      │
//! │      QueryExecutor  ── Σ speed·count / Σ count            │
//! └─────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod buffer;

// ── 输入 tile ─────────────────────────────────────────────────────────────────
pub mod tile;
pub mod sample;

// ── 列存层 ────────────────────────────────────────────────────────────────────
pub mod field_type;
pub mod encoding;
pub mod compression;
pub mod page;
pub mod index;
pub mod footer;
pub mod schema;
pub mod batch;
pub mod predicate;
pub mod table_writer;
pub mod table_reader;

// ── 转码 / 查询 ───────────────────────────────────────────────────────────────
pub mod transcode;
pub mod query;

pub use common::{HistError, Result};
pub use config::TranscodeOptions;
pub use query::{query_tile, QueryExecutor, QueryOutcome, SpeedAverage, SpeedQuery};
pub use table_reader::TableReader;
pub use table_writer::{BatchSink, TableWriter};
pub use tile::{HistogramTile, TileBuilder, TileEntry};
pub use transcode::{transcode_file, TranscodeStats, Transcoder};
