//! # Perseus Protocol
//!
//! Perseus 气动机械臂命令协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（关节数、命令列表上限、默认超时）
//! - `status`: 响应状态与拒绝原因
//! - `mode`: 控制空间 / 控制类型
//! - `command`: 子命令（运动、力矩、末端执行器）
//!
//! 本 crate 只描述"发什么"和"收到什么"，不关心字节布局；
//! 编码由具体的网络通道实现负责。

pub mod command;
pub mod constants;
pub mod mode;
pub mod status;

// 重新导出常用类型
pub use command::*;
pub use constants::*;
pub use mode::*;
pub use status::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u32 },

    #[error("Non-finite value in {field}[{index}]")]
    NonFinite { field: &'static str, index: usize },

    #[error("Parse error: {0}")]
    ParseError(String),
}
