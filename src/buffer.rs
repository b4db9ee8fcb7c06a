//! 只读字节缓冲：内存映射文件或自有 Vec

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::common::Result;

#[derive(Debug)]
pub enum ByteSource {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl ByteSource {
    /// 只读映射整个文件。空文件不映射，直接返回空缓冲。
    pub fn map_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self::Owned(Vec::new()));
        }
        // SAFETY: 映射只读；文件在映射期间被外部截断属于调用方约束之外的情况
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(v)  => v,
            Self::Mapped(m) => m,
        }
    }
}
