//! 各编码格式的码流头部解析.

pub mod av1;
pub mod h264;
pub mod h265;
pub mod vp9;
