//! # ying-core
//!
//! Ying 视频码流引擎核心库, 提供错误类型与位级读写基础设施.
//!
//! 所有编解码器头部解析器 (H.264 SPS, VP9, AV1 OBU) 都建立在本 crate 之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod leb128;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{YingError, YingResult};
pub use leb128::Leb128Cursor;
