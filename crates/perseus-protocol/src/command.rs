//! 子命令定义
//!
//! 一个 `RobotCommand` 由若干子命令顺序组成，每个子命令是以下三种之一：
//!
//! - [`MotionCommand`]: 关节目标位置/速度，可选末端位姿与肘部构型
//! - [`TorqueCommand`]: 关节期望力矩
//! - [`EndEffectorCommand`]: 末端执行器离散动作
//!
//! 每个子命令自带超时，与组合命令的总超时相互独立。

use crate::constants::{DEFAULT_MOTION_TIMEOUT, DEFAULT_STEP_TIMEOUT, JOINT_NUM, JointArray};
use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn check_finite(field: &'static str, values: &[f64]) -> Result<(), ProtocolError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ProtocolError::NonFinite { field, index }),
        None => Ok(()),
    }
}

// ============================================================================
// 运动命令
// ============================================================================

/// 运动命令
///
/// 关节位置单位为 rad，速度为 rad/s。末端位姿为 4x4 行主序齐次矩阵。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionCommand {
    /// 目标关节位置
    pub joint_positions: JointArray,
    /// 目标关节速度
    pub joint_velocities: JointArray,
    /// 末端齐次变换（行主序）
    pub ee_transform: [f64; 16],
    /// 末端速度（线速度 + 角速度）
    pub ee_velocity: [f64; 6],
    /// 肘部构型提示，仅在 `has_elbow` 为 true 时有效
    pub elbow: [f64; 2],
    pub has_elbow: bool,
    /// 本步超时
    pub timeout: Duration,
}

impl Default for MotionCommand {
    fn default() -> Self {
        Self {
            joint_positions: [0.0; JOINT_NUM],
            joint_velocities: [0.0; JOINT_NUM],
            ee_transform: [0.0; 16],
            ee_velocity: [0.0; 6],
            elbow: [0.0; 2],
            has_elbow: false,
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl MotionCommand {
    /// 以关节目标位置和超时创建运动命令
    pub fn create_command(joint_positions: JointArray, timeout: Duration) -> Self {
        Self {
            joint_positions,
            timeout,
            ..Default::default()
        }
    }

    /// 以关节目标位置创建运动命令（超时 30s）
    pub fn with_positions(joint_positions: JointArray) -> Self {
        Self::create_command(joint_positions, DEFAULT_MOTION_TIMEOUT)
    }

    pub fn velocities(mut self, joint_velocities: JointArray) -> Self {
        self.joint_velocities = joint_velocities;
        self
    }

    pub fn ee_transform(mut self, transform: [f64; 16]) -> Self {
        self.ee_transform = transform;
        self
    }

    pub fn ee_velocity(mut self, velocity: [f64; 6]) -> Self {
        self.ee_velocity = velocity;
        self
    }

    /// 设置肘部构型（同时置位 `has_elbow`）
    pub fn elbow(mut self, elbow: [f64; 2]) -> Self {
        self.elbow = elbow;
        self.has_elbow = true;
        self
    }

    /// 检查所有数值字段均为有限值
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_finite("joint_positions", &self.joint_positions)?;
        check_finite("joint_velocities", &self.joint_velocities)?;
        check_finite("ee_transform", &self.ee_transform)?;
        check_finite("ee_velocity", &self.ee_velocity)?;
        if self.has_elbow {
            check_finite("elbow", &self.elbow)?;
        }
        Ok(())
    }
}

// ============================================================================
// 力矩命令
// ============================================================================

/// 力矩命令（单位 Nm）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TorqueCommand {
    pub desired_torque: JointArray,
    pub timeout: Duration,
}

impl Default for TorqueCommand {
    fn default() -> Self {
        Self {
            desired_torque: [0.0; JOINT_NUM],
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl TorqueCommand {
    pub fn new(desired_torque: JointArray, timeout: Duration) -> Self {
        Self {
            desired_torque,
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_finite("desired_torque", &self.desired_torque)
    }
}

// ============================================================================
// 末端执行器命令
// ============================================================================

/// 末端执行器动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum EndEffectorAction {
    /// 无动作
    #[default]
    Idle = 0,
    /// 张开
    Open = 1,
    /// 闭合
    Close = 2,
    /// 强力闭合
    ForceClose = 3,
}

impl EndEffectorAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Open => "Open",
            Self::Close => "Close",
            Self::ForceClose => "ForceClose",
        }
    }

    /// 宽松解析：无法识别的名称返回 `Idle`
    pub fn from_str_safe(s: &str) -> Self {
        s.parse().unwrap_or(Self::Idle)
    }
}

impl FromStr for EndEffectorAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(Self::Idle),
            "Open" => Ok(Self::Open),
            "Close" => Ok(Self::Close),
            "ForceClose" => Ok(Self::ForceClose),
            other => Err(ProtocolError::ParseError(format!(
                "unknown end-effector action: {other}"
            ))),
        }
    }
}

impl fmt::Display for EndEffectorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 末端执行器命令
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndEffectorCommand {
    pub ee_action: EndEffectorAction,
    pub timeout: Duration,
}

impl Default for EndEffectorCommand {
    fn default() -> Self {
        Self {
            ee_action: EndEffectorAction::Idle,
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl EndEffectorCommand {
    pub fn new(ee_action: EndEffectorAction, timeout: Duration) -> Self {
        Self { ee_action, timeout }
    }
}

// ============================================================================
// 子命令（和类型）
// ============================================================================

/// 子命令种类（不携带数据，用于模式匹配检查和日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubCommandKind {
    Motion,
    Torque,
    EndEffector,
}

impl SubCommandKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Motion => "Motion",
            Self::Torque => "Torque",
            Self::EndEffector => "EndEffector",
        }
    }
}

impl fmt::Display for SubCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 子命令
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubCommand {
    Motion(MotionCommand),
    Torque(TorqueCommand),
    EndEffector(EndEffectorCommand),
}

impl SubCommand {
    pub fn kind(&self) -> SubCommandKind {
        match self {
            Self::Motion(_) => SubCommandKind::Motion,
            Self::Torque(_) => SubCommandKind::Torque,
            Self::EndEffector(_) => SubCommandKind::EndEffector,
        }
    }

    /// 本步超时
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Motion(m) => m.timeout,
            Self::Torque(t) => t.timeout,
            Self::EndEffector(e) => e.timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Motion(m) => m.validate(),
            Self::Torque(t) => t.validate(),
            Self::EndEffector(_) => Ok(()),
        }
    }

    pub fn as_motion(&self) -> Option<&MotionCommand> {
        match self {
            Self::Motion(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_end_effector(&self) -> Option<&EndEffectorCommand> {
        match self {
            Self::EndEffector(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MotionCommand> for SubCommand {
    fn from(cmd: MotionCommand) -> Self {
        Self::Motion(cmd)
    }
}

impl From<TorqueCommand> for SubCommand {
    fn from(cmd: TorqueCommand) -> Self {
        Self::Torque(cmd)
    }
}

impl From<EndEffectorCommand> for SubCommand {
    fn from(cmd: EndEffectorCommand) -> Self {
        Self::EndEffector(cmd)
    }
}
