//! 行批次
//!
//! - [`RowBatch`]   — 写端：六列并行数组，定容，flush 后 `clear` 复用缓冲
//! - [`ColumnBatch`]— 读端：一次 `next_batch` 产出的投影列（仅匹配行）

use crate::schema::{Row, ROW_WIDTH};

// ── RowBatch ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RowBatch {
    columns:  [Vec<u32>; ROW_WIDTH],
    capacity: usize,
}

impl RowBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: std::array::from_fn(|_| Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&mut self, row: &Row) {
        debug_assert!(!self.is_full(), "push into a full batch");
        for (col, v) in self.columns.iter_mut().zip(row.to_array()) {
            col.push(v);
        }
    }

    pub fn len(&self)      -> usize { self.columns[0].len() }
    pub fn capacity(&self) -> usize { self.capacity }
    pub fn is_empty(&self) -> bool  { self.len() == 0 }
    pub fn is_full(&self)  -> bool  { self.len() >= self.capacity }

    /// 逻辑截断为 0 行，保留已分配的缓冲
    pub fn clear(&mut self) {
        self.columns.iter_mut().for_each(Vec::clear);
    }

    pub fn column(&self, idx: usize) -> &[u32] { &self.columns[idx] }

    pub fn columns(&self) -> [&[u32]; ROW_WIDTH] {
        std::array::from_fn(|i| self.columns[i].as_slice())
    }

    pub fn row(&self, idx: usize) -> Option<Row> {
        if idx >= self.len() {
            return None;
        }
        Some(Row::from_array(std::array::from_fn(|c| self.columns[c][idx])))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }
}

// ── ColumnBatch ───────────────────────────────────────────────────────────────

/// 读端批次；列顺序与扫描时给出的投影顺序一致
#[derive(Debug, Default)]
pub struct ColumnBatch {
    columns: Vec<Vec<u32>>,
}

impl ColumnBatch {
    pub fn new(num_columns: usize) -> Self {
        Self { columns: vec![Vec::new(); num_columns] }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool { self.num_rows() == 0 }

    pub fn num_columns(&self) -> usize { self.columns.len() }

    pub fn column(&self, idx: usize) -> &[u32] { &self.columns[idx] }

    /// 调整列数并清空所有列（保留缓冲）
    pub(crate) fn reset(&mut self, num_columns: usize) {
        self.columns.resize_with(num_columns, Vec::new);
        self.columns.iter_mut().for_each(Vec::clear);
    }

    pub(crate) fn column_mut(&mut self, idx: usize) -> &mut Vec<u32> {
        &mut self.columns[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(segment_id: u32) -> Row {
        Row {
            vtype: 0, segment_id, day_hour: 1,
            next_segment_id: 2, speed_bucket: 3, count: 4,
        }
    }

    #[test]
    fn batch_fills_to_capacity_and_clears() {
        let mut batch = RowBatch::with_capacity(2);
        batch.push(&row(1));
        assert!(!batch.is_full());
        batch.push(&row(2));
        assert!(batch.is_full());
        assert_eq!(batch.column(1), &[1, 2]);
        assert_eq!(batch.rows().collect::<Vec<_>>(), vec![row(1), row(2)]);

        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.column(0).is_empty());
        assert_eq!(batch.capacity(), 2);
    }

    #[test]
    fn column_batch_reset_reshapes() {
        let mut batch = ColumnBatch::new(1);
        batch.column_mut(0).extend([1, 2, 3]);
        assert_eq!(batch.num_rows(), 3);
        batch.reset(2);
        assert_eq!(batch.num_columns(), 2);
        assert!(batch.is_empty());
    }
}
