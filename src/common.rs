//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 路段 ID = 路段在 tile 段序列中的位置
pub type SegmentId = u32;
/// `day * 24 + hour`
pub type DayHour   = u32;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── 输入 tile ──
    #[error("malformed tile: {0}")]
    TileFormat(String),
    #[error(
        "segment {segment_id} entry {entry_index}: next_segment_idx {next_segment_idx} \
         out of range ({available} next segments)"
    )]
    NextSegmentOutOfRange {
        segment_id:       SegmentId,
        entry_index:      usize,
        next_segment_idx: u8,
        available:        usize,
    },

    // ── 列存表 ──
    #[error("malformed table: {0}")]
    TableFormat(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    // ── 查询 / 参数 ──
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("segment id set must not be empty")]
    EmptySegmentSet,
    #[error("batch capacity must be at least 1")]
    InvalidBatchCapacity,
}

pub type Result<T> = std::result::Result<T, HistError>;
