//! 转码配置

use crate::common::{HistError, Result};
use crate::field_type::CompressionType;
use crate::schema::TableSchema;

/// 每个 block（一次 flush）的默认行数
pub const DEFAULT_BATCH_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub batch_capacity: usize,
    pub compression:    CompressionType,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self { batch_capacity: DEFAULT_BATCH_CAPACITY, compression: CompressionType::Lz4 }
    }
}

impl TranscodeOptions {
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity; self
    }
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        self.compression = comp; self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(HistError::InvalidBatchCapacity);
        }
        Ok(())
    }

    pub fn schema(&self) -> TableSchema {
        TableSchema::histogram(self.compression)
    }
}
