//! Annex-B 字节流扫描.
//!
//! Annex-B 使用起始码 (start code) 分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! 扫描函数只定位边界, 不解释 NAL 语义, H.264 与 H.265 共用.
//! 未找到起始码时返回缓冲区长度作为哨兵值, 调用方视为流结束.

/// 若 `data` 以起始码开头, 返回起始码长度 (3 或 4)
///
/// 少于 4 字节的缓冲区不视为 Annex-B.
pub fn annex_b_box_size(data: &[u8]) -> Option<usize> {
    if data.len() < 4 {
        return None;
    }
    if data[0] == 0 && data[1] == 0 {
        if data[2] == 1 {
            return Some(3);
        }
        if data[2] == 0 && data[3] == 1 {
            return Some(4);
        }
    }
    None
}

/// 是否为 Annex-B 格式
pub fn is_annex_b(data: &[u8]) -> bool {
    annex_b_box_size(data).is_some()
}

/// 从 `start` 开始查找下一个起始码, 返回起始码首字节位置
///
/// 未找到时返回 `data.len()`.
pub fn find_next_start_code(data: &[u8], start: usize) -> usize {
    match scan_start_code(data, start) {
        Some((pos, _)) => pos,
        None => data.len(),
    }
}

/// 从 `start` 开始查找下一个起始码, 返回起始码之后的第一个字节位置
///
/// 未找到时返回 `data.len()`.
pub fn find_next_start_code_end(data: &[u8], start: usize) -> usize {
    match scan_start_code(data, start) {
        Some((pos, len)) => pos + len,
        None => data.len(),
    }
}

/// 返回 (起始码位置, 起始码长度)
fn scan_start_code(data: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 3 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && data[i + 3] == 1 {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

/// Annex-B 流中的一个 NAL 单元 (借用视图, 不复制)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// 起始码在流中的偏移
    pub offset: usize,
    /// 起始码长度 (3 或 4)
    pub start_code_len: usize,
    /// NAL 数据 (不含起始码, 含 NAL 头部)
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// NAL 头部首字节
    pub fn header_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// 该单元在流中的结束位置 (不含)
    pub fn end(&self) -> usize {
        self.offset + self.start_code_len + self.data.len()
    }
}

/// NAL 单元迭代器
///
/// 流不以起始码开头时不产生任何单元.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    data: &'a [u8],
    /// 下一个单元的起始码位置与长度
    next: Option<(usize, usize)>,
}

/// 遍历 Annex-B 流中的 NAL 单元
pub fn nal_units(data: &[u8]) -> NalUnits<'_> {
    NalUnits {
        data,
        next: annex_b_box_size(data).map(|len| (0, len)),
    }
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, start_code_len) = self.next.take()?;
        let begin = offset + start_code_len;
        if begin >= self.data.len() {
            return None;
        }

        self.next = scan_start_code(self.data, begin + 1);
        let end = self.next.map_or(self.data.len(), |(pos, _)| pos);

        Some(NalUnit {
            offset,
            start_code_len,
            data: &self.data[begin..end],
        })
    }
}

/// 移除 emulation prevention 字节, 将 NAL 负载转换为 RBSP
///
/// `00 00 03` 序列中的 `03` 被删除.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }
    rbsp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80, 0x40]);
        data
    }

    #[test]
    fn test_annex_b_box_size() {
        assert_eq!(annex_b_box_size(&[0, 0, 1, 0x65]), Some(3));
        assert_eq!(annex_b_box_size(&[0, 0, 0, 1, 0x65]), Some(4));
        assert_eq!(annex_b_box_size(&[0, 0, 1]), None, "少于 4 字节不是 Annex-B");
        assert_eq!(annex_b_box_size(&[0, 0, 0, 0x10, 0x65]), None, "AVCC 长度前缀");
        assert!(!is_annex_b(&[]));
    }

    #[test]
    fn test_find_next_start_code() {
        let data = sample_stream();
        // 从 NAL 头部之后开始扫描
        assert_eq!(find_next_start_code(&data, 5), 8);
        assert_eq!(find_next_start_code_end(&data, 5), 11);
        assert_eq!(find_next_start_code(&data, 12), 15);
        assert_eq!(find_next_start_code_end(&data, 12), 19);
        assert_eq!(find_next_start_code(&data, 20), data.len(), "未找到应返回长度");
        assert_eq!(find_next_start_code_end(&data, 20), data.len());
    }

    #[test]
    fn test_nal_units_iteration() {
        let data = sample_stream();
        let units: Vec<_> = nal_units(&data).collect();
        assert_eq!(units.len(), 3, "应有 3 个 NAL 单元");

        assert_eq!(units[0].offset, 0);
        assert_eq!(units[0].start_code_len, 4);
        assert_eq!(units[0].data, &[0x67, 0x42, 0x00, 0x1E]);

        assert_eq!(units[1].offset, 8);
        assert_eq!(units[1].start_code_len, 3);
        assert_eq!(units[1].header_byte(), Some(0x68));

        assert_eq!(units[2].start_code_len, 4);
        assert_eq!(units[2].end(), data.len());
    }

    #[test]
    fn test_nal_units_not_annex_b() {
        let data = [0x00, 0x00, 0x00, 0x04, 0x65, 0x88, 0x80, 0x40];
        assert_eq!(nal_units(&data).count(), 0);
    }

    #[test]
    fn test_remove_emulation_prevention() {
        let data = [0x42, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01, 0x03];
        assert_eq!(
            remove_emulation_prevention(&data),
            vec![0x42, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03]
        );
    }
}
