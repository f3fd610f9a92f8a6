//! 响应状态与拒绝原因
//!
//! 远端控制器对每个命令 ID 异步上报状态码。这里提供：
//! - 原始状态码到 [`ResponseStatus`] 的安全转换（越界一律视为 `Unknown`）
//! - 终止状态判定 [`ResponseStatus::is_action_finished`]
//! - 仅用于日志的字符串投影

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 命令执行状态
///
/// 枚举值有序：`Idle < Sending < Waiting < SubSuccess < Success < Fail
/// < UserStop < Timeout < Abort < Refused < Unknown`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ResponseStatus {
    /// 空闲，无命令在执行
    #[default]
    Idle = 0,
    /// 命令正在发送
    Sending = 1,
    /// 已送达，等待结果
    Waiting = 2,
    /// 子步骤成功（如路径点到达）
    SubSuccess = 3,
    /// 命令整体完成
    Success = 4,
    /// 执行失败
    Fail = 5,
    /// 用户停止
    UserStop = 6,
    /// 执行超时
    Timeout = 7,
    /// 系统中止
    Abort = 8,
    /// 命令被拒绝
    Refused = 9,
    /// 未知状态
    Unknown = 10,
}

impl ResponseStatus {
    /// 从远端上报的原始状态码转换
    ///
    /// 只有 `[Waiting, Refused]` 区间内的值会被接受，其余（包括 `Idle`、`Sending`
    /// 这类只在本地产生的状态）一律映射为 `Unknown`，绝不会被当作成功。
    pub fn from_raw(raw: u32) -> Self {
        let valid = u32::from(Self::Waiting)..=u32::from(Self::Refused);
        if valid.contains(&raw) {
            Self::try_from(raw).unwrap_or(Self::Unknown)
        } else {
            Self::Unknown
        }
    }

    /// 转换为原始状态码
    pub fn as_raw(self) -> u32 {
        self.into()
    }

    /// 动作是否已结束（终止状态）
    ///
    /// 终止集合：`Success`、`Fail`、`UserStop`、`Timeout`、`Abort`、`Refused`。
    pub const fn is_action_finished(self) -> bool {
        matches!(
            self,
            Self::Success
                | Self::Fail
                | Self::UserStop
                | Self::Timeout
                | Self::Abort
                | Self::Refused
        )
    }

    /// 是否为成功结束
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// 诊断用字符串
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Sending => "Sending",
            Self::Waiting => "Waiting",
            Self::SubSuccess => "Step Successful",
            Self::Success => "Action Completed",
            Self::Fail => "Fail",
            Self::UserStop => "User-Stop",
            Self::Timeout => "Timeout",
            Self::Abort => "Abort",
            Self::Refused => "Command Refused",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 拒绝原因
///
/// 仅在状态为 [`ResponseStatus::Refused`] 时携带。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum RefusedReason {
    /// 无拒绝原因
    #[default]
    None = 0,
    /// 请求无效
    InvalidRequest = 1,
    /// 客户端未授权
    Unauthorized = 2,
    /// 请求的资源不存在
    NotFound = 3,
    /// 服务端内部错误
    ServerError = 4,
    /// 请求超时
    Timeout = 5,
    /// 请求来源错误
    WrongRequestSource = 6,
    /// 机器人尚未完成自检
    SelfCheckInProgress = 7,
    /// 机器人正在执行其它任务
    RobotBusy = 8,
    /// 目标设备不匹配
    RobotMismatch = 9,
}

impl RefusedReason {
    /// 从原始值转换
    pub fn from_raw(raw: u32) -> Result<Self, ProtocolError> {
        Self::try_from(raw).map_err(|_| ProtocolError::InvalidValue {
            field: "refused_reason".to_string(),
            value: raw,
        })
    }

    /// 诊断用字符串
    ///
    /// 与服务端日志中的标签一致，`RobotMismatch` 输出为 `"RobotDismatch"`。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::InvalidRequest => "InvalidRequest",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::ServerError => "ServerError",
            Self::Timeout => "Timeout",
            Self::WrongRequestSource => "WrongRequestSource",
            Self::SelfCheckInProgress => "SelfCheckInProgress",
            Self::RobotBusy => "RobotBusy",
            Self::RobotMismatch => "RobotDismatch",
        }
    }
}

impl fmt::Display for RefusedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
