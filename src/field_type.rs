//! 列的物理字段类型、编码与压缩方式

use crate::common::{HistError, Result};

/// 列在表文件中的存储类型（内存中统一为 u32）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    UInt8,
    UInt32,
}

impl FieldType {
    /// Plain 编码下每个值的字节宽度
    pub fn fixed_size(self) -> usize {
        match self {
            Self::UInt8  => 1,
            Self::UInt32 => 4,
        }
    }

    pub fn max_value(self) -> u32 {
        match self {
            Self::UInt8  => u8::MAX as u32,
            Self::UInt32 => u32::MAX,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::UInt8  => 1,
            Self::UInt32 => 4,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::UInt8),
            4 => Ok(Self::UInt32),
            _ => Err(HistError::TableFormat(format!("unknown field type tag {tag}"))),
        }
    }
}

/// 编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    Plain,
    RunLength,
    DeltaBinary,
}

impl EncodingType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Plain       => 0,
            Self::RunLength   => 1,
            Self::DeltaBinary => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Plain),
            1 => Ok(Self::RunLength),
            2 => Ok(Self::DeltaBinary),
            _ => Err(HistError::TableFormat(format!("unknown encoding tag {tag}"))),
        }
    }
}

/// 压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    None,
    #[default]
    Lz4,
}

impl CompressionType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4  => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            _ => Err(HistError::TableFormat(format!("unknown compression tag {tag}"))),
        }
    }
}

/// 每列的元数据（写入 Footer）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name:         String,
    pub field_type:   FieldType,
    pub encoding:     EncodingType,
    pub compression:  CompressionType,
    /// 是否为每个 block 生成 BloomFilter（等值/IN 剪枝）
    pub bloom_filter: bool,
}

impl ColumnMeta {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(), field_type,
            encoding: EncodingType::Plain,
            compression: CompressionType::Lz4,
            bloom_filter: false,
        }
    }

    pub fn with_encoding(mut self, enc: EncodingType) -> Self {
        self.encoding = enc; self
    }
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        self.compression = comp; self
    }
    pub fn with_bloom_filter(mut self) -> Self {
        self.bloom_filter = true; self
    }
}
