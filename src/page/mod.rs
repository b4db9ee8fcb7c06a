//! Data Page 读写
//!
//! 一个 page = 一个 block 中的一列。
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ value_count  (u32 LE)            │
//! │ uncomp_size  (u32 LE)            │
//! │ data         (encoded+compressed)│
//! │ CRC32        (u32 LE)            │  覆盖前面全部字节
//! └──────────────────────────────────┘
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::common::{HistError, Result};
use crate::compression;
use crate::encoding;
use crate::field_type::ColumnMeta;

const HEADER_LEN:  usize = 8;
const TRAILER_LEN: usize = 4;

/// 编码 → 压缩 → 加 header + CRC
pub fn build_page(values: &[u32], meta: &ColumnMeta) -> Result<Vec<u8>> {
    let encoded    = encoding::encode(values, meta.field_type, meta.encoding)?;
    let compressed = compression::compress(&encoded, meta.compression)?;

    let mut page = Vec::with_capacity(HEADER_LEN + compressed.len() + TRAILER_LEN);
    page.write_u32::<LittleEndian>(values.len() as u32)?;
    page.write_u32::<LittleEndian>(encoded.len() as u32)?;
    page.extend_from_slice(&compressed);

    let crc = crc32fast::hash(&page);
    page.write_u32::<LittleEndian>(crc)?;
    Ok(page)
}

/// 校验并解码一页，值追加到 `out`。
///
/// 页头声明的值个数必须等于 `expected_count`，解压长度不能超过该个数下的编码上限；
/// 两者都在分配解码缓冲之前检查。
pub fn decode_page(
    data:           &[u8],
    meta:           &ColumnMeta,
    expected_count: usize,
    out:            &mut Vec<u32>,
) -> Result<()> {
    if data.len() < HEADER_LEN + TRAILER_LEN {
        return Err(HistError::TableFormat(format!("page of {} bytes is too short", data.len())));
    }
    let payload_end = data.len() - TRAILER_LEN;
    let stored_crc  = LittleEndian::read_u32(&data[payload_end..]);
    if crc32fast::hash(&data[..payload_end]) != stored_crc {
        return Err(HistError::ChecksumMismatch);
    }

    let value_count = LittleEndian::read_u32(&data[0..4]) as usize;
    if value_count != expected_count {
        return Err(HistError::TableFormat(format!(
            "page holds {value_count} values, expected {expected_count}"
        )));
    }
    let uncomp_size = LittleEndian::read_u32(&data[4..8]) as usize;
    let limit = encoding::max_encoded_len(meta.field_type, meta.encoding, value_count);
    if uncomp_size > limit {
        return Err(HistError::TableFormat(format!(
            "page declares {uncomp_size} uncompressed bytes, at most {limit} expected"
        )));
    }

    let raw = compression::decompress(&data[HEADER_LEN..payload_end], meta.compression, uncomp_size)?;
    encoding::decode_into(&raw, meta.field_type, meta.encoding, value_count, out)
}
