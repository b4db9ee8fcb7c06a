//! # histogram-columnar 使用案例
//!
//! 1. 生成样例 tile 并写入文件
//! 2. 转码为列存表
//! 3. 查看表结构
//! 4. 对随机路段集合做加权平均速度查询，并与直接读 tile 的结果对照

use histogram_columnar::{
    query_tile, sample, transcode_file, HistogramTile, QueryExecutor, SpeedQuery, TableReader,
    TranscodeOptions,
};

fn main() -> histogram_columnar::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   histogram-columnar 演示                                  ");
    println!("═══════════════════════════════════════════════════════════\n");

    let dir = std::env::temp_dir().join("histcol-demo");
    std::fs::create_dir_all(&dir)?;
    let tile_path  = dir.join("sample.tile");
    let table_path = dir.join("sample.hcol");

    // =========================================================================
    // 1. 样例 tile
    // =========================================================================
    println!("【1】生成 2000 个路段的样例 tile ...");
    let bytes = sample::sample_tile_builder(2_000, sample::DEFAULT_SEED).write_to(&tile_path)?;
    println!("    {} ({bytes} bytes)\n", tile_path.display());

    // =========================================================================
    // 2. 转码
    // =========================================================================
    println!("【2】转码为列存表 (batch = 500, LZ4) ...");
    let stats = transcode_file(&tile_path, &table_path, &TranscodeOptions::default())?;
    println!("    rows = {}, blocks = {}, bytes = {}\n", stats.rows, stats.batches, stats.bytes);

    // =========================================================================
    // 3. 表结构
    // =========================================================================
    println!("【3】打开表 ...");
    let reader = TableReader::open(&table_path)?;
    for col in &reader.schema().columns {
        println!("    {:<16} {:?} / {:?}", col.name, col.field_type, col.encoding);
    }
    println!();

    // =========================================================================
    // 4. 查询
    // =========================================================================
    println!("【4】周一 12 点，随机 50 个路段 ...");
    let tile = HistogramTile::open(&tile_path)?;
    let executor = QueryExecutor::new(&reader)?;
    let query = SpeedQuery::new(sample::random_segment_ids(50, 2_000, 7), 12)?;

    let (outcome, scan) = executor.run_with_stats(&query)?;
    println!("    table : {outcome}");
    println!("    tile  : {}", query_tile(&tile, &query));
    println!(
        "    pruned {} / {} blocks, matched {} rows",
        scan.blocks_pruned, scan.blocks_total, scan.rows_matched
    );

    println!("\n    ✓ OK");
    Ok(())
}
