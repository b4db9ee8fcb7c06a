//! 确定性的样例 tile 与查询集合
//!
//! 数据形状：每个路段 0–12 个有数据的小时（集中在正午前后，7 天相同），
//! 1–4 个后继路段（`id+1 ..= id+n`），每个 (小时, 后继) 取一个随机速度桶并
//! 展开为相邻的三个桶（夹在 `[0, MAX_SPEED_BUCKET]`），计数至少为 1。
//! 抽到 0 小时的路段没有 entry。

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{Result, SegmentId};
use crate::tile::{TileBuilder, TileEntry};

pub const DEFAULT_SEED: u64 = 12345;
pub const MAX_SPEED_BUCKET: u8 = 24;
const MAX_ACTIVE_HOURS: u8 = 12;
const MAX_NEXT_SEGMENTS: u8 = 4;
const MAX_COUNT: u32 = 32;

pub fn sample_tile_builder(num_segments: u32, seed: u64) -> TileBuilder {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = TileBuilder::new();

    for segment_id in 0..num_segments {
        let num_hours: u8 = rng.gen_range(0..=MAX_ACTIVE_HOURS);
        if num_hours == 0 {
            builder.add_empty_segment();
            continue;
        }
        let num_next: u8 = rng.gen_range(1..=MAX_NEXT_SEGMENTS);

        let start_hour = 12 - num_hours / 2;
        let mut entries = Vec::with_capacity(7 * num_hours as usize * num_next as usize * 3);
        for day in 0..7u8 {
            for hour in start_hour..start_hour + num_hours {
                for next in 0..num_next {
                    let center: u8 = rng.gen_range(0..=MAX_SPEED_BUCKET);
                    for bucket in [center.saturating_sub(1), center, center + 1] {
                        entries.push(TileEntry::new(
                            day * 24 + hour,
                            next,
                            bucket.min(MAX_SPEED_BUCKET),
                            rng.gen_range(1..=MAX_COUNT),
                        ));
                    }
                }
            }
        }

        let next_ids: Vec<SegmentId> = (1..=num_next as u32)
            .map(|n| segment_id.wrapping_add(n))
            .collect();
        builder.add_segment(next_ids, entries);
    }
    builder
}

/// 直接返回序列化后的 tile 字节
pub fn sample_tile(num_segments: u32, seed: u64) -> Result<Vec<u8>> {
    sample_tile_builder(num_segments, seed).finish()
}

/// 从 `[0, max_segment_id]` 中抽取最多 `count` 个不重复的路段 ID
pub fn random_segment_ids(count: usize, max_segment_id: SegmentId, seed: u64) -> BTreeSet<SegmentId> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(0..=max_segment_id)).collect()
}
