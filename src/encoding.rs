//! 列编码
//!
//! 所有列在内存中都是 `u32`，按 [`FieldType`] 决定落盘宽度：
//! - **Plain**      — 定宽小端字节
//! - **RunLength**  — (run u32, value) 对，适合 day_hour 这类成片重复的列
//! - **DeltaBinary**— 首值 + 逐项差值（wrapping），适合单调递增的 segment_id

use byteorder::{ByteOrder, LittleEndian};

use crate::common::{HistError, Result};
use crate::field_type::{EncodingType, FieldType};

// ── 统一编/解码入口 ───────────────────────────────────────────────────────────

pub fn encode(values: &[u32], ft: FieldType, enc: EncodingType) -> Result<Vec<u8>> {
    if let Some(v) = values.iter().find(|&&v| v > ft.max_value()) {
        return Err(HistError::Encoding(format!("value {v} does not fit {ft:?}")));
    }
    let mut out = Vec::with_capacity(values.len() * ft.fixed_size());
    match enc {
        EncodingType::Plain       => plain::encode(values, ft, &mut out),
        EncodingType::RunLength   => rle::encode(values, ft, &mut out),
        EncodingType::DeltaBinary => delta::encode(values, ft, &mut out),
    }
    Ok(out)
}

/// 解码 `count` 个值追加到 `out`（调用方负责清空，以便复用缓冲区）
pub fn decode_into(
    data:  &[u8],
    ft:    FieldType,
    enc:   EncodingType,
    count: usize,
    out:   &mut Vec<u32>,
) -> Result<()> {
    let start = out.len();
    match enc {
        EncodingType::Plain       => plain::decode(data, ft, count, out)?,
        EncodingType::RunLength   => rle::decode(data, ft, count, out)?,
        EncodingType::DeltaBinary => delta::decode(data, ft, count, out)?,
    }
    let got = out.len() - start;
    if got != count {
        return Err(HistError::Encoding(format!(
            "{enc:?}: expected {count} values, decoded {got}"
        )));
    }
    Ok(())
}

/// 编码 `count` 个值最多占用的字节数；解码前用来约束页头声明的长度
pub fn max_encoded_len(ft: FieldType, enc: EncodingType, count: usize) -> usize {
    let w = ft.fixed_size();
    match enc {
        EncodingType::Plain       => count * w,
        EncodingType::RunLength   => count * (4 + w),
        EncodingType::DeltaBinary => if count == 0 { 0 } else { w + (count - 1) * 4 },
    }
}

fn put(out: &mut Vec<u8>, v: u32, ft: FieldType) {
    match ft {
        FieldType::UInt8  => out.push(v as u8),
        FieldType::UInt32 => out.extend_from_slice(&v.to_le_bytes()),
    }
}

fn get(data: &[u8], pos: usize, ft: FieldType) -> Option<u32> {
    let w = ft.fixed_size();
    let bytes = data.get(pos..pos + w)?;
    Some(match ft {
        FieldType::UInt8  => bytes[0] as u32,
        FieldType::UInt32 => LittleEndian::read_u32(bytes),
    })
}

fn truncated(what: &str) -> HistError {
    HistError::Encoding(format!("{what}: data truncated"))
}

// ── Plain ─────────────────────────────────────────────────────────────────────
mod plain {
    use super::*;

    pub fn encode(values: &[u32], ft: FieldType, out: &mut Vec<u8>) {
        for &v in values {
            put(out, v, ft);
        }
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize, out: &mut Vec<u32>) -> Result<()> {
        let w = ft.fixed_size();
        if data.len() != count * w {
            return Err(truncated("plain"));
        }
        out.extend((0..count).filter_map(|i| get(data, i * w, ft)));
        Ok(())
    }
}

// ── Run-Length Encoding ───────────────────────────────────────────────────────
mod rle {
    use super::*;

    pub fn encode(values: &[u32], ft: FieldType, out: &mut Vec<u8>) {
        let Some((&first, rest)) = values.split_first() else { return };
        let mut cur = first;
        let mut run: u32 = 1;

        for &v in rest {
            if v == cur {
                run += 1;
            } else {
                write_run(out, run, cur, ft);
                cur = v;
                run = 1;
            }
        }
        write_run(out, run, cur, ft);
    }

    fn write_run(out: &mut Vec<u8>, run: u32, v: u32, ft: FieldType) {
        out.extend_from_slice(&run.to_le_bytes());
        put(out, v, ft);
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize, out: &mut Vec<u32>) -> Result<()> {
        let stride = 4 + ft.fixed_size();
        let mut pos = 0;
        let mut produced = 0usize;
        while pos < data.len() {
            let run = data.get(pos..pos + 4)
                .map(LittleEndian::read_u32)
                .ok_or_else(|| truncated("rle"))? as usize;
            let val = get(data, pos + 4, ft).ok_or_else(|| truncated("rle"))?;
            pos += stride;

            produced += run;
            if produced > count {
                return Err(HistError::Encoding("rle: run exceeds value count".into()));
            }
            out.extend(std::iter::repeat(val).take(run));
        }
        Ok(())
    }
}

// ── Delta Binary ──────────────────────────────────────────────────────────────
mod delta {
    use super::*;

    pub fn encode(values: &[u32], ft: FieldType, out: &mut Vec<u8>) {
        let Some((&base, rest)) = values.split_first() else { return };
        put(out, base, ft);
        let mut prev = base;
        for &x in rest {
            // 差值可能为负，按 u32 wrapping 存储
            out.extend_from_slice(&x.wrapping_sub(prev).to_le_bytes());
            prev = x;
        }
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize, out: &mut Vec<u32>) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let base = get(data, 0, ft).ok_or_else(|| truncated("delta"))?;
        let mut pos = ft.fixed_size();
        if data.len() != pos + (count - 1) * 4 {
            return Err(truncated("delta"));
        }
        out.push(base);
        let mut prev = base;
        while pos < data.len() {
            prev = prev.wrapping_add(LittleEndian::read_u32(&data[pos..pos + 4]));
            out.push(prev);
            pos += 4;
        }
        Ok(())
    }
}
