//! 客户端控制模块
//!
//! 本模块提供 Perseus 机械臂的动作执行接口，包括：
//! - 组合命令 [`RobotCommand`]（1..=20 条子命令，带游标）
//! - 动作控制器 [`Controller`]（单命令状态机，独立工作线程）
//! - 机器人门面 [`PerseusRobot`]（按模式分派，串行执行）
//!
//! # 使用场景
//!
//! 大多数用户应直接使用 [`PerseusRobot::control`]，它阻塞到动作结束并返回终止结果。
//! 需要非阻塞提交、轮询进度或从其他线程停止时，使用 [`Controller::execute_motion`]
//! 返回的 [`MotionHandle`]。

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod robot;

// 重新导出常用类型
pub use command::RobotCommand;
pub use config::ControllerConfig;
pub use controller::{CommandIdGenerator, Controller, MotionHandle, MotionOutcome, WaitingCallback};
pub use error::{ControlError, ErrorKind};
pub use robot::PerseusRobot;
