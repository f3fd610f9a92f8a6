//! # Perseus Network Channel Layer
//!
//! 控制器与机器人服务端之间的命令/状态通道抽象。
//!
//! 控制器只依赖 [`Channel`] trait：
//!
//! ```text
//! Controller ──send(CommandRequest)──▶ Channel ──▶ robot server
//! Controller ◀──StatusSink::on_status── Channel ◀── status frame
//! ```
//!
//! 连接建立、字节编码、丢包重传都属于具体通道实现，不在本 crate 内。
//! 启用 `mock` feature 可获得一个进程内的 [`mock::MockChannel`]，用于测试和演示。

use perseus_protocol::{RefusedReason, ResponseStatus, SubCommand};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod hooks;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use hooks::{SinkRegistry, StatusSink};

/// 网络层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Channel not connected")]
    NotConnected,
    #[error("Connection lost: {0}")]
    Disconnected(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Protocol corruption: {0}")]
    Protocol(String),
}

impl NetworkError {
    /// 连接层面的错误（需要重新建立连接才能恢复）
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Disconnected(_))
    }
}

/// 命令 ID
///
/// 由控制器侧的 ID 生成器分配，`0` 表示尚未分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandId(pub u32);

impl CommandId {
    pub const UNASSIGNED: CommandId = CommandId(0);

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 发往服务端的一步命令
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandRequest {
    pub command_id: CommandId,
    /// 当前步序号（从 0 开始）
    pub step: usize,
    /// 组合命令的总步数
    pub step_count: usize,
    pub payload: SubCommand,
    pub step_timeout: Duration,
    pub total_timeout: Duration,
}

/// 服务端上报的状态帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusUpdate {
    pub command_id: CommandId,
    /// 原始状态码，经 [`ResponseStatus::from_raw`] 分类
    pub raw_status: u32,
    pub refused_reason: Option<RefusedReason>,
}

impl StatusUpdate {
    pub fn new(command_id: CommandId, status: ResponseStatus) -> Self {
        Self {
            command_id,
            raw_status: status.as_raw(),
            refused_reason: None,
        }
    }

    /// 原始状态码（可能越界）
    pub fn raw(command_id: CommandId, raw_status: u32) -> Self {
        Self {
            command_id,
            raw_status,
            refused_reason: None,
        }
    }

    pub fn refused(command_id: CommandId, reason: RefusedReason) -> Self {
        Self {
            command_id,
            raw_status: ResponseStatus::Refused.as_raw(),
            refused_reason: Some(reason),
        }
    }

    /// 分类后的状态
    pub fn status(&self) -> ResponseStatus {
        ResponseStatus::from_raw(self.raw_status)
    }
}

/// 命令/状态通道
///
/// # 约定
///
/// - `send` 返回 `Ok(true)` 表示已被通道接受；`Ok(false)` 表示未连接等
///   "静默拒绝"，这是正常的否定结果；`Err` 只用于协议损坏等异常。
/// - 状态帧通过 `attach` 注册的 [`StatusSink`] 异步送达，可以在任意线程回调，
///   也可以在 `send` 内部同步回调。
/// - 同一命令 ID 的重复、乱序帧由控制器侧过滤，通道不需要去重。
pub trait Channel: Send + Sync {
    fn send(&self, request: &CommandRequest) -> Result<bool, NetworkError>;

    fn attach(&self, sink: Arc<dyn StatusSink>);

    /// 请求服务端取消命令（尽力而为）
    fn cancel(&self, command_id: CommandId) -> Result<(), NetworkError> {
        let _ = command_id;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}
