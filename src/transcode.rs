//! Tile → 列存表转码
//!
//! 段序外层、entry 序内层遍历 tile，每个 (segment, entry) 产出一行：
//! `next_segment_idx` 在所属路段的 next_segment_ids 上做边界检查后解析为路段 ID。
//! 批次满时交给 [`BatchSink`]，遍历结束后再 flush 一次剩余行（空批不 flush）。

use std::path::Path;

use tracing::{debug, info};

use crate::batch::RowBatch;
use crate::common::{HistError, Result};
use crate::config::TranscodeOptions;
use crate::schema::{Row, VTYPE_TRANSITION};
use crate::table_writer::{BatchSink, TableWriter};
use crate::tile::HistogramTile;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeStats {
    pub segments: usize,
    pub rows:     u64,
    /// sink 收到的批次数
    pub batches:  usize,
    /// 输出文件字节数（仅 `transcode_file`）
    pub bytes:    u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    batch_capacity: usize,
}

impl Transcoder {
    pub fn new(batch_capacity: usize) -> Result<Self> {
        if batch_capacity == 0 {
            return Err(HistError::InvalidBatchCapacity);
        }
        Ok(Self { batch_capacity })
    }

    pub fn batch_capacity(&self) -> usize { self.batch_capacity }

    pub fn run<S: BatchSink>(&self, tile: &HistogramTile, sink: &mut S) -> Result<TranscodeStats> {
        let mut batch = RowBatch::with_capacity(self.batch_capacity);
        let mut stats = TranscodeStats::default();

        for segment in tile.segments() {
            stats.segments += 1;
            for (entry_index, entry) in segment.entries().enumerate() {
                let next_segment_id = segment
                    .next_segment_id(entry.next_segment_idx as usize)
                    .ok_or(HistError::NextSegmentOutOfRange {
                        segment_id:       segment.id(),
                        entry_index,
                        next_segment_idx: entry.next_segment_idx,
                        available:        segment.next_segment_ids_len(),
                    })?;

                batch.push(&Row {
                    vtype:        VTYPE_TRANSITION,
                    segment_id:   segment.id(),
                    day_hour:     entry.day_hour as u32,
                    next_segment_id,
                    speed_bucket: entry.speed_bucket as u32,
                    count:        entry.count,
                });
                stats.rows += 1;

                if batch.is_full() {
                    flush(sink, &mut batch, &mut stats)?;
                }
            }
        }
        if !batch.is_empty() {
            flush(sink, &mut batch, &mut stats)?;
        }
        Ok(stats)
    }
}

fn flush<S: BatchSink>(sink: &mut S, batch: &mut RowBatch, stats: &mut TranscodeStats) -> Result<()> {
    debug!(batch = stats.batches, rows = batch.len(), "flushing batch");
    sink.write_batch(batch)?;
    batch.clear();
    stats.batches += 1;
    Ok(())
}

/// 打开 tile、转码并写出完整的表文件。任何错误都不会留下表文件。
pub fn transcode_file(
    tile_path:  impl AsRef<Path>,
    table_path: impl AsRef<Path>,
    options:    &TranscodeOptions,
) -> Result<TranscodeStats> {
    options.validate()?;
    let transcoder = Transcoder::new(options.batch_capacity)?;
    let tile = HistogramTile::open(tile_path.as_ref())?;

    let mut writer = TableWriter::create(table_path.as_ref(), options.schema())?;
    // 出错时 writer 被 drop，临时文件随之删除
    let mut stats = transcoder.run(&tile, &mut writer)?;
    stats.bytes = writer.finish()?.bytes;

    info!(
        tile = %tile_path.as_ref().display(),
        table = %table_path.as_ref().display(),
        segments = stats.segments, rows = stats.rows, batches = stats.batches,
        "transcode complete"
    );
    Ok(stats)
}
