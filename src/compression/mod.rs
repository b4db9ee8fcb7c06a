//! 页压缩/解压（LZ4 / None）

use crate::common::{HistError, Result};
use crate::field_type::CompressionType;

pub fn compress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4  => {
            if data.is_empty() {
                return Ok(Vec::new());
            }
            lz4::block::compress(data, None, false)
                .map_err(|e| HistError::Compression(e.to_string()))
        }
    }
}

pub fn decompress(
    data:             &[u8],
    codec:            CompressionType,
    uncompressed_len: usize,
) -> Result<Vec<u8>> {
    let out = match codec {
        CompressionType::None => data.to_vec(),
        CompressionType::Lz4 if uncompressed_len == 0 => Vec::new(),
        CompressionType::Lz4  => {
            let len = i32::try_from(uncompressed_len)
                .map_err(|_| HistError::Compression(format!("page too large: {uncompressed_len}")))?;
            lz4::block::decompress(data, Some(len))
                .map_err(|e| HistError::Compression(e.to_string()))?
        }
    };
    if out.len() != uncompressed_len {
        return Err(HistError::Compression(format!(
            "expected {uncompressed_len} bytes, got {}", out.len()
        )));
    }
    Ok(out)
}
