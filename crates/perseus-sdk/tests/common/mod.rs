//! 集成测试公共工具

#![allow(dead_code)]

use perseus_sdk::net::mock::MockChannel;
use perseus_sdk::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// 等待异步状态的上限
pub const WAIT: Duration = Duration::from_secs(5);

pub fn joint_step(value: f64, timeout: Duration) -> MotionCommand {
    MotionCommand::create_command([value; JOINT_NUM], timeout)
}

pub fn gripper(action: EndEffectorAction) -> EndEffectorCommand {
    EndEffectorCommand::new(action, Duration::from_secs(5))
}

/// 创建控制器并绑定一个手动注入状态的 Mock 通道
pub fn manual_controller(mode: ControllerMode) -> (Controller, Arc<MockChannel>) {
    let controller = Controller::new(mode).expect("controller");
    let channel = Arc::new(MockChannel::new());
    controller.bind_network(channel.clone()).expect("bind");
    (controller, channel)
}

/// 每一步都以 `SubSuccess` 应答的通道（最后一步由控制器提升为 `Success`）
pub fn stepping_channel() -> Arc<MockChannel> {
    Arc::new(MockChannel::with_responder(|req| {
        vec![
            StatusUpdate::new(req.command_id, ResponseStatus::Waiting),
            StatusUpdate::new(req.command_id, ResponseStatus::SubSuccess),
        ]
    }))
}
