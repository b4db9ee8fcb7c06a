//! 端到端：tile 文件 → 列存表文件 → 查询

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use histogram_columnar::batch::ColumnBatch;
use histogram_columnar::field_type::{ColumnMeta, CompressionType, FieldType};
use histogram_columnar::predicate::Predicate;
use histogram_columnar::sample::{random_segment_ids, sample_tile_builder, DEFAULT_SEED};
use histogram_columnar::schema::{
    TableSchema, COL_COUNT, COL_DAY_HOUR, COL_NEXT_SEGMENT_ID, COL_SEGMENT_ID, COL_SPEED_BUCKET,
    COL_VTYPE, ROW_COLUMNS, VTYPE_TRANSITION,
};
use histogram_columnar::{
    query_tile, transcode_file, HistError, HistogramTile, QueryExecutor, QueryOutcome,
    SpeedQuery, TableReader, TableWriter, TileBuilder, TileEntry, TranscodeOptions,
};

fn transcode(dir: &Path, builder: &TileBuilder, options: &TranscodeOptions) -> PathBuf {
    let tile_path = dir.join("in.tile");
    let table_path = dir.join("out.hcol");
    builder.write_to(&tile_path).unwrap();
    transcode_file(&tile_path, &table_path, options).unwrap();
    table_path
}

fn example_builder() -> TileBuilder {
    let mut b = TileBuilder::new();
    for _ in 0..5 {
        b.add_empty_segment();
    }
    b.add_segment(vec![5, 9], vec![
        TileEntry::new(100, 1, 3, 10),
        TileEntry::new(100, 0, 7, 5),
    ]);
    b
}

#[test]
fn worked_example_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let table = transcode(dir.path(), &example_builder(), &TranscodeOptions::default());
    let reader = TableReader::open(&table).unwrap();

    assert_eq!(reader.num_rows(), 2);
    assert_eq!(reader.read_column(COL_NEXT_SEGMENT_ID).unwrap(), vec![9, 5]);
    assert_eq!(reader.read_column(COL_VTYPE).unwrap(), vec![VTYPE_TRANSITION; 2]);

    let executor = QueryExecutor::new(&reader).unwrap();
    let outcome = executor.run(&SpeedQuery::new([5], 100).unwrap()).unwrap();
    let QueryOutcome::Average(avg) = outcome else { panic!("expected data, got {outcome}") };
    assert_eq!(avg.weighted_sum, 65);
    assert_eq!(avg.total_count, 15);
    assert!((avg.value - 65.0 / 15.0).abs() < 1e-12);

    assert!(executor.run(&SpeedQuery::new([5], 101).unwrap()).unwrap().is_no_data());
    assert!(executor.run(&SpeedQuery::new([4, 6], 100).unwrap()).unwrap().is_no_data());
}

#[test]
fn table_rows_mirror_tile_entries() {
    let dir = tempfile::tempdir().unwrap();
    let builder = sample_tile_builder(300, DEFAULT_SEED);
    let table = transcode(dir.path(), &builder, &TranscodeOptions::default().with_batch_capacity(97));
    let tile = HistogramTile::from_bytes(builder.finish().unwrap()).unwrap();
    let reader = TableReader::open(&table).unwrap();

    let columns: Vec<Vec<u32>> = ROW_COLUMNS.iter()
        .map(|name| reader.read_column(name).unwrap())
        .collect();
    assert_eq!(reader.num_rows() as usize, tile.total_entries());
    assert_eq!(reader.num_blocks(), tile.total_entries().div_ceil(97));

    let mut row = 0;
    for seg in tile.segments() {
        for e in seg.entries() {
            let expected = [
                VTYPE_TRANSITION,
                seg.id(),
                e.day_hour as u32,
                seg.next_segment_id(e.next_segment_idx as usize).unwrap(),
                e.speed_bucket as u32,
                e.count,
            ];
            let actual: Vec<u32> = columns.iter().map(|c| c[row]).collect();
            assert_eq!(actual, expected, "row {row}");
            row += 1;
        }
    }
    assert_eq!(row, columns[0].len());
}

#[test]
fn table_query_matches_tile_query() {
    let dir = tempfile::tempdir().unwrap();
    let builder = sample_tile_builder(2_000, DEFAULT_SEED);
    let table = transcode(dir.path(), &builder, &TranscodeOptions::default());
    let tile = HistogramTile::from_bytes(builder.finish().unwrap()).unwrap();
    let reader = TableReader::open(&table).unwrap();
    let executor = QueryExecutor::new(&reader).unwrap();

    let mut with_data = 0;
    for seed in 0..20u64 {
        let ids = random_segment_ids(50, 2_100, seed);
        let day_hour = (seed as u32 * 37) % (7 * 24);
        let query = SpeedQuery::new(ids, day_hour).unwrap();
        let from_table = executor.run(&query).unwrap();
        assert_eq!(from_table, query_tile(&tile, &query), "seed {seed}");
        if !from_table.is_no_data() {
            with_data += 1;
        }
    }
    assert!(with_data > 0, "sample queries never hit data");
}

#[test]
fn pushdown_agrees_with_brute_force() {
    let dir = tempfile::tempdir().unwrap();
    let table = transcode(
        dir.path(),
        &sample_tile_builder(500, 99),
        &TranscodeOptions::default().with_compression(CompressionType::None),
    );
    let reader = TableReader::open(&table).unwrap();
    let seg   = reader.read_column(COL_SEGMENT_ID).unwrap();
    let hour  = reader.read_column(COL_DAY_HOUR).unwrap();
    let speed = reader.read_column(COL_SPEED_BUCKET).unwrap();
    let count = reader.read_column(COL_COUNT).unwrap();

    let ids: BTreeSet<u32> = random_segment_ids(40, 520, 3);
    let day_hour = 12;
    let expected: Vec<(u32, u32)> = (0..seg.len())
        .filter(|&r| ids.contains(&seg[r]) && hour[r] == day_hour)
        .map(|r| (speed[r], count[r]))
        .collect();

    let predicate = Predicate::and([
        Predicate::is_in(COL_SEGMENT_ID, ids.iter().copied()),
        Predicate::eq(COL_DAY_HOUR, day_hour),
    ]);
    let mut scan = reader.scan(&[COL_SPEED_BUCKET, COL_COUNT], &predicate).unwrap();
    let mut batch = ColumnBatch::default();
    let mut actual = Vec::new();
    while scan.next_batch(&mut batch).unwrap() {
        actual.extend(batch.column(0).iter().copied().zip(batch.column(1).iter().copied()));
    }
    assert_eq!(actual, expected);
    assert_eq!(scan.stats().rows_matched as usize, expected.len());
}

#[test]
fn selective_query_prunes_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let table = transcode(dir.path(), &sample_tile_builder(1_000, DEFAULT_SEED), &TranscodeOptions::default());
    let reader = TableReader::open(&table).unwrap();
    assert!(reader.num_blocks() > 10);

    let (_, stats) = QueryExecutor::new(&reader).unwrap()
        .run_with_stats(&SpeedQuery::new([10, 11, 12], 12).unwrap())
        .unwrap();
    assert_eq!(stats.blocks_total, reader.num_blocks());
    assert!(stats.blocks_pruned > reader.num_blocks() / 2, "{stats:?}");
    assert!(stats.rows_scanned < reader.num_rows());
}

#[test]
fn zero_average_is_not_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = TileBuilder::new();
    b.add_segment(vec![1], vec![TileEntry::new(3, 0, 0, 8), TileEntry::new(4, 0, 6, 2)]);
    let table = transcode(dir.path(), &b, &TranscodeOptions::default());
    let reader = TableReader::open(&table).unwrap();
    let executor = QueryExecutor::new(&reader).unwrap();

    assert_eq!(executor.run(&SpeedQuery::new([0], 3).unwrap()).unwrap().average(), Some(0.0));
    assert_eq!(executor.run(&SpeedQuery::new([0], 5).unwrap()).unwrap(), QueryOutcome::NoData);
}

#[test]
fn repeated_queries_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let table = transcode(dir.path(), &sample_tile_builder(400, 5), &TranscodeOptions::default());
    let reader = TableReader::open(&table).unwrap();
    let executor = QueryExecutor::new(&reader).unwrap();
    let query = SpeedQuery::new(0..400, 60).unwrap();

    let first = executor.run(&query).unwrap();
    for _ in 0..5 {
        assert_eq!(executor.run(&query).unwrap(), first);
    }
}

#[test]
fn out_of_range_index_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let tile_path = dir.path().join("bad.tile");
    let table_path = dir.path().join("bad.hcol");
    let mut b = TileBuilder::new();
    b.add_segment(vec![1, 2], (0..600).map(|h| TileEntry::new((h % 168) as u8, 0, 1, 1)).collect::<Vec<_>>());
    b.add_segment(vec![], vec![TileEntry::new(0, 0, 1, 1)]);
    b.write_to(&tile_path).unwrap();

    let err = transcode_file(&tile_path, &table_path, &TranscodeOptions::default()).unwrap_err();
    assert!(
        matches!(err, HistError::NextSegmentOutOfRange { segment_id: 1, entry_index: 0, available: 0, .. }),
        "{err}"
    );
    assert!(!table_path.exists());
    assert!(!dir.path().join("bad.hcol.partial").exists());
}

#[test]
fn malformed_tile_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tile_path = dir.path().join("junk.tile");
    std::fs::write(&tile_path, b"not a tile").unwrap();
    let err = transcode_file(&tile_path, dir.path().join("t.hcol"), &TranscodeOptions::default()).unwrap_err();
    assert!(matches!(err, HistError::TileFormat(_)), "{err}");
}

#[test]
fn zero_batch_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tile_path = dir.path().join("in.tile");
    example_builder().write_to(&tile_path).unwrap();
    let err = transcode_file(
        &tile_path,
        dir.path().join("t.hcol"),
        &TranscodeOptions::default().with_batch_capacity(0),
    ).unwrap_err();
    assert!(matches!(err, HistError::InvalidBatchCapacity));
}

#[test]
fn query_requires_all_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("narrow.hcol");
    let schema = TableSchema::new(vec![
        ColumnMeta::new(COL_SEGMENT_ID, FieldType::UInt32),
        ColumnMeta::new(COL_DAY_HOUR, FieldType::UInt8),
        ColumnMeta::new(COL_SPEED_BUCKET, FieldType::UInt8),
    ]);
    let mut w = TableWriter::create(&path, schema).unwrap();
    w.write_columns(&[&[1], &[2], &[3]]).unwrap();
    w.finish().unwrap();

    let reader = TableReader::open(&path).unwrap();
    match QueryExecutor::new(&reader) {
        Err(HistError::MissingColumn(name)) => assert_eq!(name, COL_COUNT),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn concurrent_queries_share_one_reader() {
    let dir = tempfile::tempdir().unwrap();
    let builder = sample_tile_builder(1_000, DEFAULT_SEED);
    let table = transcode(dir.path(), &builder, &TranscodeOptions::default());
    let tile = HistogramTile::from_bytes(builder.finish().unwrap()).unwrap();
    let reader = TableReader::open(&table).unwrap();

    std::thread::scope(|s| {
        for t in 0..4u64 {
            let (reader, tile) = (&reader, &tile);
            s.spawn(move || {
                let executor = QueryExecutor::new(reader).unwrap();
                for i in 0..5u64 {
                    let query = SpeedQuery::new(random_segment_ids(30, 1_000, t * 10 + i), 12).unwrap();
                    assert_eq!(executor.run(&query).unwrap(), query_tile(tile, &query));
                }
            });
        }
    });
}

#[test]
fn empty_tile_yields_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = TileBuilder::new();
    b.add_empty_segment();
    b.add_empty_segment();
    let table = transcode(dir.path(), &b, &TranscodeOptions::default());
    let reader = TableReader::open(&table).unwrap();

    assert_eq!(reader.num_rows(), 0);
    assert_eq!(reader.num_blocks(), 0);
    assert!(reader.read_column(COL_SEGMENT_ID).unwrap().is_empty());
    let outcome = QueryExecutor::new(&reader).unwrap().run(&SpeedQuery::new([0, 1], 0).unwrap()).unwrap();
    assert_eq!(outcome, QueryOutcome::NoData);
}

#[test]
fn missing_output_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let tile_path = dir.path().join("in.tile");
    example_builder().write_to(&tile_path).unwrap();

    let table_path = dir.path().join("nope").join("x.hcol");
    let err = transcode_file(&tile_path, &table_path, &TranscodeOptions::default()).unwrap_err();
    assert!(matches!(err, HistError::Io(_)), "{err}");
    assert!(!table_path.exists());
    assert!(!dir.path().join("nope").join("x.hcol.partial").exists());
}
