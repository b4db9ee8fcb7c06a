//! 合取谓词与 block 级下推
//!
//! [`Predicate`] 用列名描述条件；`bind` 之后得到按列序号求值的
//! [`BoundPredicate`]，由 [`crate::table_reader::TableScan`] 在扫描内部执行：
//! 先用 ZoneMap / BloomFilter 判断整块能否跳过，再在已解码的谓词列上细化选择向量。

use std::collections::BTreeSet;

use crate::common::Result;
use crate::footer::BlockMeta;
use crate::schema::TableSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq { column: String, value: u32 },
    In { column: String, values: BTreeSet<u32> },
    /// 空合取恒为真
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: u32) -> Self {
        Self::Eq { column: column.into(), value }
    }

    pub fn is_in(column: &str, values: impl IntoIterator<Item = u32>) -> Self {
        Self::In { column: column.into(), values: values.into_iter().collect() }
    }

    pub fn and(preds: impl IntoIterator<Item = Predicate>) -> Self {
        Self::And(preds.into_iter().collect())
    }

    /// 匹配所有行
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// 解析列名；未知列返回 `MissingColumn`
    pub fn bind(&self, schema: &TableSchema) -> Result<BoundPredicate> {
        Ok(match self {
            Self::Eq { column, value } => BoundPredicate::Eq {
                column: schema.column_index(column)?,
                value:  *value,
            },
            Self::In { column, values } => BoundPredicate::In {
                column: schema.column_index(column)?,
                values: values.clone(),
            },
            Self::And(children) => BoundPredicate::And(
                children.iter().map(|p| p.bind(schema)).collect::<Result<_>>()?,
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundPredicate {
    Eq { column: usize, value: u32 },
    In { column: usize, values: BTreeSet<u32> },
    And(Vec<BoundPredicate>),
}

impl BoundPredicate {
    /// 谓词引用到的列（去重、升序）
    pub fn columns(&self) -> Vec<usize> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out.into_iter().collect()
    }

    fn collect_columns(&self, out: &mut BTreeSet<usize>) {
        match self {
            Self::Eq { column, .. } | Self::In { column, .. } => { out.insert(*column); }
            Self::And(children) => children.iter().for_each(|c| c.collect_columns(out)),
        }
    }

    /// 依据 block 统计判断整块能否跳过（只会漏判，不会误判）
    pub fn can_skip(&self, block: &BlockMeta) -> bool {
        match self {
            Self::Eq { column, value } => match block.chunks.get(*column) {
                Some(chunk) => {
                    !chunk.zone_map.contains(*value)
                        || chunk.bloom.as_ref().is_some_and(|bf| !bf.may_contain(*value))
                }
                None => false,
            },
            Self::In { column, values } => match block.chunks.get(*column) {
                Some(chunk) => {
                    let zm = chunk.zone_map;
                    !values.range(zm.min..=zm.max).any(|&v| {
                        chunk.bloom.as_ref().map_or(true, |bf| bf.may_contain(v))
                    })
                }
                None => false,
            },
            Self::And(children) => children.iter().any(|c| c.can_skip(block)),
        }
    }

    /// 在已解码的列上细化选择向量（行号）；`columns` 按列序号索引
    pub fn refine(&self, columns: &[Vec<u32>], selection: &mut Vec<u32>) {
        match self {
            Self::Eq { column, value } => {
                let col = &columns[*column];
                selection.retain(|&r| col[r as usize] == *value);
            }
            Self::In { column, values } => {
                let col = &columns[*column];
                selection.retain(|&r| values.contains(&col[r as usize]));
            }
            Self::And(children) => {
                for c in children {
                    if selection.is_empty() {
                        break;
                    }
                    c.refine(columns, selection);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::CompressionType;
    use crate::footer::ChunkMeta;
    use crate::index::{BloomFilter, ZoneMap};
    use crate::schema::{COL_DAY_HOUR, COL_SEGMENT_ID};
    use crate::common::HistError;

    fn block(segment_ids: &[u32], day_hours: &[u32]) -> BlockMeta {
        let chunk = |values: &[u32], bloom: bool| ChunkMeta {
            offset: 0,
            len: 0,
            zone_map: ZoneMap::from_values(values).unwrap(),
            bloom: bloom.then(|| BloomFilter::from_values(values)),
        };
        BlockMeta {
            first_row: 0,
            num_rows: segment_ids.len() as u32,
            chunks: vec![
                chunk(&[0], false),
                chunk(segment_ids, true),
                chunk(day_hours, false),
            ],
        }
    }

    fn bound(p: &Predicate) -> BoundPredicate {
        p.bind(&TableSchema::histogram(CompressionType::None)).unwrap()
    }

    #[test]
    fn eq_prunes_out_of_range_block() {
        let b = block(&[10, 20], &[100, 101]);
        assert!(bound(&Predicate::eq(COL_DAY_HOUR, 99)).can_skip(&b));
        assert!(!bound(&Predicate::eq(COL_DAY_HOUR, 100)).can_skip(&b));
    }

    #[test]
    fn in_set_prunes_when_no_member_overlaps() {
        let b = block(&[10, 20], &[100]);
        assert!(bound(&Predicate::is_in(COL_SEGMENT_ID, [1, 2, 30])).can_skip(&b));
        assert!(!bound(&Predicate::is_in(COL_SEGMENT_ID, [1, 20])).can_skip(&b));
    }

    #[test]
    fn and_skips_if_any_branch_skips() {
        let b = block(&[10, 20], &[100]);
        let p = Predicate::and([
            Predicate::is_in(COL_SEGMENT_ID, [10]),
            Predicate::eq(COL_DAY_HOUR, 5),
        ]);
        assert!(bound(&p).can_skip(&b));
        assert!(!bound(&Predicate::all()).can_skip(&b));
    }

    #[test]
    fn refine_applies_conjunction() {
        let columns = vec![
            vec![0, 0, 0, 0],
            vec![5, 5, 6, 7],
            vec![100, 101, 100, 100],
        ];
        let p = bound(&Predicate::and([
            Predicate::is_in(COL_SEGMENT_ID, [5, 7]),
            Predicate::eq(COL_DAY_HOUR, 100),
        ]));
        assert_eq!(p.columns(), vec![1, 2]);

        let mut sel: Vec<u32> = (0..4).collect();
        p.refine(&columns, &mut sel);
        assert_eq!(sel, vec![0, 3]);
    }

    #[test]
    fn binding_unknown_column_fails() {
        let err = Predicate::eq("hour", 1)
            .bind(&TableSchema::histogram(CompressionType::None))
            .unwrap_err();
        assert!(matches!(err, HistError::MissingColumn(_)));
    }
}
