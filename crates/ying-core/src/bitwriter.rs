//! 比特流写入器.
//!
//! 向调用方提供的定长缓冲区按位写入数据, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//!
//! 写入器输出的是 NAL 字节流而非 RBSP: 每个输出字节都经过 emulation prevention 检查,
//! 当前两个输出字节为 `00 00` 且下一个字节 ≤ `0x03` 时, 先插入 `0x03`.

use crate::{YingError, YingResult};

/// 需要插入 emulation prevention 字节的最大字节值
const EMULATION_THRESHOLD: u8 = 0x03;
/// emulation prevention 字节
const EMULATION_PREVENTION_BYTE: u8 = 0x03;

/// 比特流写入器
///
/// 使用大端位序 (MSB first). 写入超出缓冲区容量返回 [`YingError::OutOfSpace`],
/// [`finish`](Self::finish) 之后继续写入返回 [`YingError::WriteAfterFinish`].
///
/// # 示例
/// ```
/// use ying_core::bitwriter::BitWriter;
///
/// let mut buf = [0u8; 4];
/// let mut bw = BitWriter::new(&mut buf);
/// bw.write_bits(0b1011, 4).unwrap();
/// bw.write_ue(0).unwrap();
/// let len = bw.finish().unwrap();
/// assert_eq!(&buf[..len], &[0b1011_1000]);
/// ```
pub struct BitWriter<'a> {
    /// 输出缓冲区
    buf: &'a mut [u8],
    /// 已输出字节数 (含插入的 0x03)
    byte_pos: usize,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
    /// 最近两个输出字节
    window: u16,
    /// 是否已调用 finish
    finished: bool,
}

impl<'a> BitWriter<'a> {
    /// 在给定缓冲区上创建写入器
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            byte_pos: 0,
            current_byte: 0,
            bit_count: 0,
            window: 0xFFFF,
            finished: false,
        }
    }

    /// 缓冲区容量 (字节)
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// 已输出到缓冲区的字节数 (不含未满的当前字节)
    pub fn bytes_written(&self) -> usize {
        self.byte_pos
    }

    /// 是否已结束
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) -> YingResult<()> {
        self.ensure_writable()?;
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            let byte = self.current_byte;
            self.current_byte = 0;
            self.bit_count = 0;
            self.emit_byte(byte)?;
        }
        Ok(())
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) -> YingResult<()> {
        self.write_bit(u32::from(flag))
    }

    /// 写入 N 个位 (最多 32 位), `u(n)`
    ///
    /// 值的低 N 位被写入, 高位在前.
    pub fn write_bits(&mut self, value: u32, n: u32) -> YingResult<()> {
        self.ensure_writable()?;
        if n > 32 {
            return Err(YingError::InvalidArgument(format!(
                "write_bits: n={} 超过 32 位",
                n
            )));
        }

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_count as u32;
            let to_write = remaining.min(available);

            let shift = remaining - to_write;
            let mask = (1u32 << to_write) - 1;
            let bits = ((value >> shift) & mask) as u8;

            if to_write >= 8 {
                // 整字节写入 (bit_count 必定为 0)
                self.current_byte = bits;
            } else {
                self.current_byte = (self.current_byte << to_write) | bits;
            }
            self.bit_count += to_write as u8;

            if self.bit_count >= 8 {
                let byte = self.current_byte;
                self.current_byte = 0;
                self.bit_count = 0;
                self.emit_byte(byte)?;
            }

            remaining -= to_write;
        }
        Ok(())
    }

    /// 写入 8 位无符号整数
    pub fn write_u8(&mut self, value: u8) -> YingResult<()> {
        self.write_bits(u32::from(value), 8)
    }

    /// 写入无符号 Exp-Golomb 编码值, `ue(v)`
    ///
    /// `codeNum = value + 1`, 先写 `⌊log2(codeNum)⌋` 个 0, 再写 codeNum 本身.
    pub fn write_ue(&mut self, value: u32) -> YingResult<()> {
        let code_num = u64::from(value) + 1;
        if code_num > u64::from(u32::MAX) {
            return Err(YingError::InvalidArgument(format!(
                "ue(v) 无法编码 {}",
                value
            )));
        }
        let num_bits = 64 - code_num.leading_zeros();
        self.write_bits(0, num_bits - 1)?;
        self.write_bits(code_num as u32, num_bits)
    }

    /// 写入有符号 Exp-Golomb 编码值, `se(v)`
    ///
    /// 映射: v>0 → 2v-1, v≤0 → -2v.
    pub fn write_se(&mut self, value: i32) -> YingResult<()> {
        let value = i64::from(value);
        let code = if value > 0 { 2 * value - 1 } else { -2 * value };
        let code = u32::try_from(code)
            .map_err(|_| YingError::InvalidArgument(format!("se(v) 无法编码 {}", value)))?;
        self.write_ue(code)
    }

    /// 结束写入, 返回输出字节数
    ///
    /// 未满的尾部字节按已写入的位左对齐输出, 其余位为 0.
    pub fn finish(&mut self) -> YingResult<usize> {
        self.ensure_writable()?;
        if self.bit_count > 0 {
            let byte = self.current_byte << (8 - self.bit_count);
            self.current_byte = 0;
            self.bit_count = 0;
            self.emit_byte(byte)?;
        }
        self.finished = true;
        Ok(self.byte_pos)
    }

    fn ensure_writable(&self) -> YingResult<()> {
        if self.finished {
            return Err(YingError::WriteAfterFinish);
        }
        Ok(())
    }

    /// 输出一个完整字节, 必要时先插入 emulation prevention 字节
    fn emit_byte(&mut self, byte: u8) -> YingResult<()> {
        if self.window == 0 && byte <= EMULATION_THRESHOLD {
            self.push_raw(EMULATION_PREVENTION_BYTE)?;
        }
        self.push_raw(byte)
    }

    fn push_raw(&mut self, byte: u8) -> YingResult<()> {
        let slot = self
            .buf
            .get_mut(self.byte_pos)
            .ok_or(YingError::OutOfSpace)?;
        *slot = byte;
        self.byte_pos += 1;
        self.window = (self.window << 8) | u16::from(byte);
        Ok(())
    }
}
