//! Perseus SDK - 气动机械臂动作控制 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 状态码、控制模式、子命令定义
//! - **通道层** (`net`): 命令/状态通道抽象，连接和编码由具体实现负责
//! - **客户端层** (`client`): 组合命令、动作控制器、机器人门面
//!
//! # 快速开始
//!
//! ```rust
//! use perseus_sdk::net::mock::MockChannel;
//! use perseus_sdk::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let channel = Arc::new(MockChannel::with_responder(|req| {
//!     vec![StatusUpdate::new(req.command_id, ResponseStatus::Success)]
//! }));
//! let robot = PerseusRobot::new(channel)?;
//!
//! let cmd = RobotCommand::joint_position([0.0; JOINT_NUM], Duration::from_secs(5))?;
//! let outcome = robot.control(ControllerMode::joint_position(), cmd)?;
//! assert!(outcome.is_success());
//! # Ok::<(), ControlError>(())
//! ```

pub mod logging;
pub mod prelude;

pub use perseus_client as client;
pub use perseus_net as net;
pub use perseus_protocol as protocol;

// 客户端层（推荐入口）
pub use perseus_client::{
    CommandIdGenerator, ControlError, Controller, ControllerConfig, ErrorKind, MotionHandle,
    MotionOutcome, PerseusRobot, RobotCommand,
};

// 通道层
pub use perseus_net::{Channel, CommandId, CommandRequest, NetworkError, StatusSink, StatusUpdate};

// 协议层
pub use perseus_protocol::{
    ControlSpace, ControlType, ControllerMode, EndEffectorAction, ProtocolError, RefusedReason,
    ResponseStatus,
};

pub use logging::{init_logging, init_logging_with};
