//! 控制层错误类型定义
//!
//! 每一种错误对应一类调用方需要区分的失败：
//!
//! | 种类 | 触发条件 |
//! |------|----------|
//! | `Construction` | 命令列表为空、超过 20 条或含非有限数值 |
//! | `Control` | 游标越界访问（控制器/命令误用） |
//! | `InvalidOperation` | 已有命令在执行时再次提交、绑定网络，或模式不匹配 |
//! | `Network` | 通道发送失败或连接丢失 |
//! | `Command` | 远端报告某条命令执行失败 |
//!
//! 注意：`Refused` 是正常的终止结果，不是错误，调用方应当检查状态。

use perseus_net::{CommandId, NetworkError};
use perseus_protocol::{ProtocolError, ResponseStatus};
use thiserror::Error;

/// 错误种类（仅判别，不携带数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Construction,
    Control,
    InvalidOperation,
    Network,
    Command,
    Config,
}

/// 控制层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 命令构造失败
    #[error("Construction error: {0}")]
    Construction(String),

    /// 控制流程错误（游标越界等）
    #[error("Control error: {0}")]
    Control(String),

    /// 当前状态下不允许的操作
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// 远端报告命令执行失败
    #[error("Command {command_id} ended with {status} after {completed_steps} step(s)")]
    Command {
        command_id: CommandId,
        status: ResponseStatus,
        completed_steps: usize,
    },

    /// 配置加载/解析失败
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Construction(_) => ErrorKind::Construction,
            Self::Control(_) => ErrorKind::Control,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::Network(_) => ErrorKind::Network,
            Self::Command { .. } => ErrorKind::Command,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<ProtocolError> for ControlError {
    fn from(err: ProtocolError) -> Self {
        Self::Construction(err.to_string())
    }
}
