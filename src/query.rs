//! 加权平均速度查询
//!
//! `segment_id IN S AND day_hour = h` 下推给 [`TableScan`]，只投影
//! `speed_bucket` / `count` 两列，按批累加 `Σ speed·count / Σ count`。
//! 每次调用都使用新的累加器，同一个 [`QueryExecutor`] 可以重复调用。
//!
//! [`TableScan`]: crate::table_reader::TableScan

use std::collections::BTreeSet;

use tracing::debug;

use crate::batch::ColumnBatch;
use crate::common::{DayHour, HistError, Result, SegmentId};
use crate::predicate::Predicate;
use crate::schema::{COL_COUNT, COL_DAY_HOUR, COL_SEGMENT_ID, COL_SPEED_BUCKET};
use crate::table_reader::{ScanStats, TableReader};
use crate::tile::HistogramTile;

/// 一个速度桶覆盖的 km/h 宽度
pub const SPEED_BUCKET_KPH: f64 = 5.0;

// ── 查询参数 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedQuery {
    segment_ids: BTreeSet<SegmentId>,
    day_hour:    DayHour,
}

impl SpeedQuery {
    /// 路段集合不能为空
    pub fn new(segment_ids: impl IntoIterator<Item = SegmentId>, day_hour: DayHour) -> Result<Self> {
        let segment_ids: BTreeSet<_> = segment_ids.into_iter().collect();
        if segment_ids.is_empty() {
            return Err(HistError::EmptySegmentSet);
        }
        Ok(Self { segment_ids, day_hour })
    }

    pub fn segment_ids(&self) -> &BTreeSet<SegmentId> { &self.segment_ids }
    pub fn day_hour(&self)    -> DayHour              { self.day_hour }

    pub fn predicate(&self) -> Predicate {
        Predicate::and([
            Predicate::In { column: COL_SEGMENT_ID.into(), values: self.segment_ids.clone() },
            Predicate::eq(COL_DAY_HOUR, self.day_hour),
        ])
    }
}

// ── 查询结果 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedAverage {
    /// 平均速度桶
    pub value:        f64,
    pub weighted_sum: u128,
    pub total_count:  u64,
    pub matched_rows: u64,
}

impl SpeedAverage {
    pub fn kph(&self) -> f64 { self.value * SPEED_BUCKET_KPH }
}

/// 没有匹配行时是 `NoData`，与平均值恰好为 0 的情况区分开
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryOutcome {
    NoData,
    Average(SpeedAverage),
}

impl QueryOutcome {
    pub fn average(&self) -> Option<f64> {
        match self {
            Self::NoData     => None,
            Self::Average(a) => Some(a.value),
        }
    }

    pub fn is_no_data(&self) -> bool { matches!(self, Self::NoData) }
}

impl std::fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData     => write!(f, "no data"),
            Self::Average(a) => write!(
                f, "{:.4} (≈{:.1} km/h over {} observations)", a.value, a.kph(), a.total_count
            ),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    weighted_sum: u128,
    total_count:  u64,
    rows:         u64,
}

impl Accumulator {
    fn add(&mut self, speed_bucket: u32, count: u32) {
        self.weighted_sum += speed_bucket as u128 * count as u128;
        self.total_count  += count as u64;
        self.rows         += 1;
    }

    fn finish(self) -> QueryOutcome {
        if self.total_count == 0 {
            return QueryOutcome::NoData;
        }
        QueryOutcome::Average(SpeedAverage {
            value:        self.weighted_sum as f64 / self.total_count as f64,
            weighted_sum: self.weighted_sum,
            total_count:  self.total_count,
            matched_rows: self.rows,
        })
    }
}

// ── QueryExecutor ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor<'r> {
    reader: &'r TableReader,
}

impl<'r> QueryExecutor<'r> {
    /// 检查查询需要的四列都存在
    pub fn new(reader: &'r TableReader) -> Result<Self> {
        for name in [COL_SEGMENT_ID, COL_DAY_HOUR, COL_SPEED_BUCKET, COL_COUNT] {
            reader.column_index(name)?;
        }
        Ok(Self { reader })
    }

    pub fn run(&self, query: &SpeedQuery) -> Result<QueryOutcome> {
        self.run_with_stats(query).map(|(outcome, _)| outcome)
    }

    pub fn run_with_stats(&self, query: &SpeedQuery) -> Result<(QueryOutcome, ScanStats)> {
        let mut scan = self.reader.scan(&[COL_SPEED_BUCKET, COL_COUNT], &query.predicate())?;
        let mut batch = ColumnBatch::new(2);
        let mut acc = Accumulator::default();

        while scan.next_batch(&mut batch)? {
            for (&speed, &count) in batch.column(0).iter().zip(batch.column(1)) {
                acc.add(speed, count);
            }
        }

        let stats = scan.stats();
        debug!(
            segments = query.segment_ids.len(), day_hour = query.day_hour,
            matched = stats.rows_matched, pruned = stats.blocks_pruned,
            "speed query"
        );
        Ok((acc.finish(), stats))
    }
}

/// 不经过列存表，直接在 tile 上计算同一查询；集合中不存在的路段被忽略
pub fn query_tile(tile: &HistogramTile, query: &SpeedQuery) -> QueryOutcome {
    let mut acc = Accumulator::default();
    for &id in &query.segment_ids {
        let Some(segment) = tile.segment(id) else { continue };
        for entry in segment.entries().filter(|e| e.day_hour as u32 == query.day_hour) {
            acc.add(entry.speed_bucket as u32, entry.count);
        }
    }
    acc.finish()
}
