//! 输出行定义与表 schema

use crate::common::{DayHour, HistError, Result, SegmentId};
use crate::field_type::{ColumnMeta, CompressionType, EncodingType, FieldType};

// ── 列名 / 列序 ───────────────────────────────────────────────────────────────

pub const COL_VTYPE:           &str = "vtype";
pub const COL_SEGMENT_ID:      &str = "segment_id";
pub const COL_DAY_HOUR:        &str = "day_hour";
pub const COL_NEXT_SEGMENT_ID: &str = "next_segment_id";
pub const COL_SPEED_BUCKET:    &str = "speed_bucket";
pub const COL_COUNT:           &str = "count";

/// 行的列顺序（与 [`Row`] 字段一致）
pub const ROW_COLUMNS: [&str; ROW_WIDTH] = [
    COL_VTYPE, COL_SEGMENT_ID, COL_DAY_HOUR,
    COL_NEXT_SEGMENT_ID, COL_SPEED_BUCKET, COL_COUNT,
];
pub const ROW_WIDTH: usize = 6;

/// 转移统计行的 vtype 判别值
pub const VTYPE_TRANSITION: u32 = 0;

// ── Row ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub vtype:           u32,
    pub segment_id:      SegmentId,
    pub day_hour:        DayHour,
    /// 已解析的后继路段 ID（不是 next_segment_idx）
    pub next_segment_id: SegmentId,
    pub speed_bucket:    u32,
    pub count:           u32,
}

impl Row {
    pub fn to_array(&self) -> [u32; ROW_WIDTH] {
        [
            self.vtype, self.segment_id, self.day_hour,
            self.next_segment_id, self.speed_bucket, self.count,
        ]
    }

    pub fn from_array(v: [u32; ROW_WIDTH]) -> Self {
        Self {
            vtype: v[0], segment_id: v[1], day_hour: v[2],
            next_segment_id: v[3], speed_bucket: v[4], count: v[5],
        }
    }
}

// ── TableSchema ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnMeta>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    /// 直方图行的默认 schema。
    ///
    /// segment_id 单调递增 → Delta；day_hour / next_segment_id 成片重复 → RLE；
    /// segment_id 带 BloomFilter 以便 IN 集合剪枝。
    pub fn histogram(compression: CompressionType) -> Self {
        let col = |name: &str, ft: FieldType, enc: EncodingType| {
            ColumnMeta::new(name, ft).with_encoding(enc).with_compression(compression)
        };
        Self::new(vec![
            col(COL_VTYPE,           FieldType::UInt8,  EncodingType::DeltaBinary),
            col(COL_SEGMENT_ID,      FieldType::UInt32, EncodingType::DeltaBinary).with_bloom_filter(),
            col(COL_DAY_HOUR,        FieldType::UInt8,  EncodingType::RunLength),
            col(COL_NEXT_SEGMENT_ID, FieldType::UInt32, EncodingType::RunLength),
            col(COL_SPEED_BUCKET,    FieldType::UInt8,  EncodingType::Plain),
            col(COL_COUNT,           FieldType::UInt32, EncodingType::Plain),
        ])
    }

    pub fn num_columns(&self) -> usize { self.columns.len() }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns.iter()
            .position(|c| c.name == name)
            .ok_or_else(|| HistError::MissingColumn(name.into()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_schema_follows_row_order() {
        let schema = TableSchema::histogram(CompressionType::Lz4);
        assert_eq!(schema.column_names().collect::<Vec<_>>(), ROW_COLUMNS);
        assert_eq!(schema.column_index(COL_COUNT).unwrap(), 5);
        assert!(schema.columns[1].bloom_filter);
    }

    #[test]
    fn unknown_column_is_reported_by_name() {
        let schema = TableSchema::histogram(CompressionType::None);
        match schema.column_index("speed") {
            Err(HistError::MissingColumn(name)) => assert_eq!(name, "speed"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn row_array_order() {
        let row = Row {
            vtype: 0, segment_id: 5, day_hour: 100,
            next_segment_id: 9, speed_bucket: 3, count: 10,
        };
        assert_eq!(row.to_array(), [0, 5, 100, 9, 3, 10]);
        assert_eq!(Row::from_array(row.to_array()), row);
    }
}
