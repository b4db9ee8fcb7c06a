//! histcol - 直方图 tile 转码与查询工具
//!
//! ```bash
//! # 生成样例 tile
//! histcol generate sample.tile --segments 10000
//!
//! # 转码为列存表
//! histcol transcode sample.tile sample.hcol --batch-size 500
//!
//! # 随机 50 个路段、周四 12 点，重复 10 次计时
//! histcol query sample.hcol --day-hour 108 --random-segments 50 --iterations 10
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use histogram_columnar::config::DEFAULT_BATCH_CAPACITY;
use histogram_columnar::field_type::CompressionType;
use histogram_columnar::sample::{self, DEFAULT_SEED};
use histogram_columnar::{
    transcode_file, QueryExecutor, QueryOutcome, SpeedQuery, TableReader, TranscodeOptions,
};

/// Traffic histogram tile → columnar table tool
#[derive(Parser)]
#[command(name = "histcol", version, about = "Transcode histogram tiles and query the columnar table")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a deterministic synthetic tile
    Generate {
        /// Output tile file
        output: PathBuf,

        /// Number of segments
        #[arg(long, default_value_t = 10_000)]
        segments: u32,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },

    /// Transcode a tile into a columnar table
    Transcode {
        /// Input tile file
        tile: PathBuf,

        /// Output table file
        table: PathBuf,

        /// Rows per block
        #[arg(long, env = "HISTCOL_BATCH_SIZE", default_value_t = DEFAULT_BATCH_CAPACITY)]
        batch_size: usize,

        #[arg(long, value_enum, default_value = "lz4")]
        compression: CompressionArg,
    },

    /// Average speed bucket for a segment set at one day/hour
    Query {
        /// Table file
        table: PathBuf,

        /// day * 24 + hour
        #[arg(long)]
        day_hour: u32,

        /// Segment ids to include (repeatable)
        #[arg(long = "segment", value_name = "ID")]
        segments: Vec<u32>,

        /// Draw this many random segment ids instead
        #[arg(long, conflicts_with = "segments")]
        random_segments: Option<usize>,

        /// Upper bound for random segment ids
        #[arg(long, default_value_t = 10_000)]
        max_segment_id: u32,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Repeat the query this many times for timing
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },

    /// Print schema and block layout of a table
    Inspect {
        table: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Lz4,
}

impl From<CompressionArg> for CompressionType {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => CompressionType::None,
            CompressionArg::Lz4  => CompressionType::Lz4,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "histogram_columnar=debug,histcol=debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate { output, segments, seed } => {
            let bytes = sample::sample_tile_builder(segments, seed)
                .write_to(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), segments, bytes, "sample tile written");
            Ok(())
        }

        Commands::Transcode { tile, table, batch_size, compression } => {
            let options = TranscodeOptions::default()
                .with_batch_capacity(batch_size)
                .with_compression(compression.into());
            let started = Instant::now();
            let stats = transcode_file(&tile, &table, &options)
                .with_context(|| format!("transcoding {} → {}", tile.display(), table.display()))?;
            println!(
                "wrote {} rows in {} blocks ({} bytes) in {:.3}s",
                stats.rows, stats.batches, stats.bytes, started.elapsed().as_secs_f64()
            );
            Ok(())
        }

        Commands::Query {
            table, day_hour, segments, random_segments, max_segment_id, seed, iterations,
        } => {
            let ids = match random_segments {
                Some(n) => sample::random_segment_ids(n, max_segment_id, seed),
                None    => segments.into_iter().collect(),
            };
            if ids.is_empty() {
                bail!("no segment ids given; use --segment or --random-segments");
            }
            println!("querying {} segments at day_hour {day_hour}", ids.len());
            let query = SpeedQuery::new(ids, day_hour)?;

            let t0 = Instant::now();
            let reader = TableReader::open(&table)
                .with_context(|| format!("opening {}", table.display()))?;
            let executor = QueryExecutor::new(&reader)?;
            let setup = t0.elapsed();

            let iterations = iterations.max(1);
            let t1 = Instant::now();
            let mut outcome = QueryOutcome::NoData;
            for _ in 0..iterations {
                outcome = executor.run(&query)?;
            }
            let per_iter = t1.elapsed().as_secs_f64() / iterations as f64;

            println!(
                "val = {outcome} in {per_iter:.6}s per iteration, plus {:.6}s to setup",
                setup.as_secs_f64()
            );
            Ok(())
        }

        Commands::Inspect { table } => {
            let reader = TableReader::open(&table)
                .with_context(|| format!("opening {}", table.display()))?;
            println!("rows   : {}", reader.num_rows());
            println!("blocks : {}", reader.num_blocks());
            for (i, col) in reader.schema().columns.iter().enumerate() {
                println!(
                    "column[{i}]: {:<16} {:?} {:?} {:?}{}",
                    col.name, col.field_type, col.encoding, col.compression,
                    if col.bloom_filter { " bloom" } else { "" }
                );
            }
            Ok(())
        }
    }
}
