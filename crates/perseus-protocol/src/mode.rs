//! 控制模式定义
//!
//! `ControllerMode` = 控制空间 × 控制类型。提交命令时使用的模式必须与命令内
//! 子命令的种类相容，例如 `Task/Command` 对应末端执行器动作，
//! `Joint/Position` 对应关节运动。

use crate::command::SubCommandKind;
use std::fmt;

/// 控制空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlSpace {
    /// 关节空间
    #[default]
    Joint,
    /// 笛卡尔空间
    Cartesian,
    /// 任务空间
    Task,
    /// 零空间
    NullSpace,
    /// 用户自定义
    UserDefined,
    /// 未知
    Unknown,
}

impl ControlSpace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joint => "Joint",
            Self::Cartesian => "Cartesian",
            Self::Task => "Task",
            Self::NullSpace => "NullSpace",
            Self::UserDefined => "UserDefined",
            Self::Unknown => "Unknown",
        }
    }
}

/// 控制类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlType {
    /// 位置控制
    #[default]
    Position,
    /// 速度控制
    Velocity,
    /// 力矩控制
    Torque,
    /// 阻抗控制
    Impedance,
    /// 导纳控制
    Admittance,
    /// 离散指令（末端执行器动作等）
    Command,
    /// 外部控制器
    Extern,
    /// 未知
    Unknown,
}

impl ControlType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Velocity => "Velocity",
            Self::Torque => "Torque",
            Self::Impedance => "Impedance",
            Self::Admittance => "Admittance",
            Self::Command => "Command",
            Self::Extern => "Extern",
            Self::Unknown => "Unknown",
        }
    }
}

/// 控制模式（不可变，结构相等）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerMode {
    pub space: ControlSpace,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub ty: ControlType,
}

impl ControllerMode {
    pub const fn new(space: ControlSpace, ty: ControlType) -> Self {
        Self { space, ty }
    }

    /// 关节空间位置控制
    pub const fn joint_position() -> Self {
        Self::new(ControlSpace::Joint, ControlType::Position)
    }

    /// 关节空间力矩控制
    pub const fn joint_torque() -> Self {
        Self::new(ControlSpace::Joint, ControlType::Torque)
    }

    /// 任务空间离散指令（末端执行器）
    pub const fn task_command() -> Self {
        Self::new(ControlSpace::Task, ControlType::Command)
    }

    /// 空间和类型是否都已知
    pub const fn is_known(&self) -> bool {
        !matches!(self.space, ControlSpace::Unknown) && !matches!(self.ty, ControlType::Unknown)
    }

    /// 判断该模式能否执行某一类子命令
    ///
    /// - `Unknown` 空间或类型：不接受任何子命令
    /// - `UserDefined` 空间或 `Extern` 类型：接受全部子命令（由远端自行解释）
    /// - 运动子命令：位置/速度/阻抗/导纳类型
    /// - 力矩子命令：力矩类型
    /// - 末端执行器子命令：任务空间 + 离散指令
    pub fn accepts(&self, kind: SubCommandKind) -> bool {
        if !self.is_known() {
            return false;
        }
        if self.space == ControlSpace::UserDefined || self.ty == ControlType::Extern {
            return true;
        }
        match kind {
            SubCommandKind::Motion => matches!(
                self.ty,
                ControlType::Position
                    | ControlType::Velocity
                    | ControlType::Impedance
                    | ControlType::Admittance
            ),
            SubCommandKind::Torque => self.ty == ControlType::Torque,
            SubCommandKind::EndEffector => {
                self.space == ControlSpace::Task && self.ty == ControlType::Command
            },
        }
    }
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.space.as_str(), self.ty.as_str())
    }
}
