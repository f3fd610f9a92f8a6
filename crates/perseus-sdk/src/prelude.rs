//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use perseus_sdk::prelude::*;
//! ```

pub use perseus_client::{
    ControlError, Controller, ControllerConfig, MotionHandle, MotionOutcome, PerseusRobot,
    RobotCommand,
};
pub use perseus_net::{Channel, CommandId, StatusUpdate};
pub use perseus_protocol::{
    ControllerMode, EndEffectorAction, EndEffectorCommand, JOINT_NUM, JointArray, MotionCommand,
    RefusedReason, ResponseStatus, TorqueCommand,
};

#[cfg(feature = "mock")]
pub use perseus_net::mock::MockChannel;
