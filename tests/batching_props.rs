//! 批次边界与查询一致性的性质测试

use proptest::prelude::*;

use histogram_columnar::batch::RowBatch;
use histogram_columnar::{
    query_tile, BatchSink, HistogramTile, QueryExecutor, Result, SpeedQuery, TableReader,
    TableWriter, TileBuilder, TileEntry, Transcoder, TranscodeOptions,
};

/// 只记录每次 flush 的行数
#[derive(Default)]
struct CountingSink {
    sizes: Vec<usize>,
}

impl BatchSink for CountingSink {
    fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        self.sizes.push(batch.len());
        Ok(())
    }
}

/// 每个路段 `n` 条 entry，后继下标都取 0
fn tile_with_entry_counts(counts: &[usize]) -> HistogramTile {
    let mut b = TileBuilder::new();
    for (id, &n) in counts.iter().enumerate() {
        let entries: Vec<TileEntry> = (0..n)
            .map(|i| TileEntry::new((i % 168) as u8, 0, (i % 25) as u8, i as u32 + 1))
            .collect();
        b.add_segment(vec![id as u32 + 1], entries);
    }
    HistogramTile::from_bytes(b.finish().unwrap()).unwrap()
}

prop_compose! {
    fn arb_entry()(day_hour in 0u8..6, speed in 0u8..=24, count in 0u32..50) -> TileEntry {
        TileEntry::new(day_hour, 0, speed, count)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn flush_count_is_ceil_rows_over_capacity(
        counts in prop::collection::vec(0usize..40, 0..30),
        capacity in 1usize..64,
    ) {
        let tile = tile_with_entry_counts(&counts);
        let rows: usize = counts.iter().sum();

        let mut sink = CountingSink::default();
        let stats = Transcoder::new(capacity).unwrap().run(&tile, &mut sink).unwrap();

        prop_assert_eq!(stats.rows as usize, rows);
        prop_assert_eq!(sink.sizes.len(), rows.div_ceil(capacity));
        prop_assert_eq!(sink.sizes.iter().sum::<usize>(), rows);
        if let Some((last, full)) = sink.sizes.split_last() {
            prop_assert!(full.iter().all(|&n| n == capacity));
            prop_assert!(*last >= 1 && *last <= capacity);
        }
    }

    #[test]
    fn table_average_equals_tile_average(
        segments in prop::collection::vec(prop::collection::vec(arb_entry(), 0..12), 1..20),
        capacity in 1usize..16,
        picks in prop::collection::btree_set(0u32..24, 1..6),
        day_hour in 0u32..6,
    ) {
        let mut b = TileBuilder::new();
        for (id, entries) in segments.iter().enumerate() {
            b.add_segment(vec![id as u32 + 100], entries.clone());
        }
        let tile = HistogramTile::from_bytes(b.finish().unwrap()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.hcol");
        let options = TranscodeOptions::default().with_batch_capacity(capacity);
        let mut writer = TableWriter::create(&path, options.schema()).unwrap();
        Transcoder::new(capacity).unwrap().run(&tile, &mut writer).unwrap();
        writer.finish().unwrap();

        let reader = TableReader::open(&path).unwrap();
        let query = SpeedQuery::new(picks, day_hour).unwrap();
        let from_table = QueryExecutor::new(&reader).unwrap().run(&query).unwrap();
        prop_assert_eq!(from_table, query_tile(&tile, &query));
    }
}
