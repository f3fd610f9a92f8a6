//! 协议常量定义

use std::time::Duration;

/// 关节数量（含末端两个腕部关节）
pub const JOINT_NUM: usize = 9;

/// 单个 `RobotCommand` 最多包含的子命令数量
pub const CMD_LIST_SIZE: usize = 20;

/// 子命令默认超时
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// 组合命令默认总超时
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// `MotionCommand::with_positions` 使用的默认超时
pub const DEFAULT_MOTION_TIMEOUT: Duration = Duration::from_secs(30);

/// 关节数组类型
pub type JointArray = [f64; JOINT_NUM];
