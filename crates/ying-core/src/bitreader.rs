//! 比特流读取器.
//!
//! 从字节缓冲区中按位读取数据, 支持 H.264 参数集使用的 `u(n)`, `ue(v)`, `se(v)` 语法.
//!
//! 按大端位序读取 (MSB first). 读取器本身不处理 emulation prevention 字节,
//! 调用方应先将 NAL 负载转换为 RBSP (见 `ying_codec::annexb::remove_emulation_prevention`).

use crate::{YingError, YingResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use ying_core::bitreader::BitReader;
///
/// let data = [0b1011_0001, 0b0101_0101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b0101_0101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> YingResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(YingError::Eof);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 位标志, `u(1)`
    pub fn read_flag(&mut self) -> YingResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位), `u(n)`
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> YingResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(YingError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(YingError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取 8 位无符号整数
    pub fn read_u8(&mut self) -> YingResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// 读取无符号 Exp-Golomb 编码值, `ue(v)`
    ///
    /// 统计前导零个数 n, 再读取 n 位信息位, 结果为 `(1 << n) - 1 + info`.
    /// 前导零超过 31 个的码字无法用 u32 表示, 视为损坏数据.
    pub fn read_ue(&mut self) -> YingResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(YingError::InvalidData("Exp-Golomb 前导零过多".into()));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u32 << leading_zeros) - 1) + suffix)
    }

    /// 读取有符号 Exp-Golomb 编码值, `se(v)`
    ///
    /// 映射: 0→0, 1→1, 2→-1, 3→2, 4→-2, ...
    pub fn read_se(&mut self) -> YingResult<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i64;
        let value = if code & 1 == 0 { -magnitude } else { magnitude };
        Ok(value as i32)
    }

    /// 窥视 N 个位 (不移动位置)
    pub fn peek_bits(&mut self, n: u32) -> YingResult<u32> {
        let saved_byte = self.byte_pos;
        let saved_bit = self.bit_pos;
        let result = self.read_bits(n);
        self.byte_pos = saved_byte;
        self.bit_pos = saved_bit;
        result
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> YingResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(YingError::Eof);
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }

    /// 对齐到下一个字节边界
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }
}
