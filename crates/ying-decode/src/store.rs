//! 按时间排序的解码帧缓存.

use std::collections::BTreeMap;

/// 解码帧缓存, 以微秒时间戳为键, 键唯一
#[derive(Debug)]
pub struct DecodedFrameStore<F> {
    frames: BTreeMap<i64, F>,
}

impl<F> Default for DecodedFrameStore<F> {
    fn default() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }
}

impl<F> DecodedFrameStore<F> {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 帧数
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 插入一帧, 返回被替换的同时间戳旧帧
    pub fn insert(&mut self, timestamp: i64, frame: F) -> Option<F> {
        self.frames.insert(timestamp, frame)
    }

    /// 时间戳不晚于 `timestamp` 的最近一帧的时间戳
    pub fn nearest_at_or_before(&self, timestamp: i64) -> Option<i64> {
        self.frames.range(..=timestamp).next_back().map(|(&ts, _)| ts)
    }

    /// 取出指定时间戳的帧
    pub fn remove(&mut self, timestamp: i64) -> Option<F> {
        self.frames.remove(&timestamp)
    }

    /// 取出所有时间戳不晚于 `timestamp` 的帧, 按时间升序
    pub fn remove_up_to(&mut self, timestamp: i64) -> Vec<F> {
        let newer = match timestamp.checked_add(1) {
            Some(bound) => self.frames.split_off(&bound),
            None => BTreeMap::new(),
        };
        std::mem::replace(&mut self.frames, newer)
            .into_values()
            .collect()
    }

    /// 取出全部帧
    pub fn clear(&mut self) -> Vec<F> {
        std::mem::take(&mut self.frames).into_values().collect()
    }

    /// 最早的时间戳
    pub fn min_timestamp(&self) -> Option<i64> {
        self.frames.keys().next().copied()
    }

    /// 最晚的时间戳
    pub fn max_timestamp(&self) -> Option<i64> {
        self.frames.keys().next_back().copied()
    }
}
