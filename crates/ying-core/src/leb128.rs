//! LEB128 可变长度整数解码.
//!
//! AV1 低开销码流格式用 LEB128 记录 OBU 负载长度: 每字节低 7 位为数据,
//! 最高位为延续标志, 低位组在前. 规范限制最多 8 个字节.

use crate::{YingError, YingResult};

/// LEB128 最大字节数
pub const LEB128_MAX_BYTES: usize = 8;

/// 单次调用持有的 LEB128 读取游标
///
/// 每次解析创建一个新游标, 不在调用之间共享状态.
#[derive(Debug)]
pub struct Leb128Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Leb128Cursor<'a> {
    /// 从 `offset` 处开始读取
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    /// 当前偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 解码一个 LEB128 值并前移游标
    pub fn decode(&mut self) -> YingResult<u64> {
        let mut value = 0u64;
        for i in 0..LEB128_MAX_BYTES {
            let byte = *self.data.get(self.offset).ok_or(YingError::Eof)?;
            self.offset += 1;
            value |= u64::from(byte & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(YingError::InvalidData(format!(
            "LEB128 超过 {} 字节",
            LEB128_MAX_BYTES
        )))
    }
}
