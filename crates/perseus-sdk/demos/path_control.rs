//! 路径控制示例
//!
//! 同一个机器人上依次执行：
//! 1. 关节位置模式下的两点路径（每步 5s，总计 30s）
//! 2. 任务空间指令模式下的夹爪 Open → ForceClose
//!
//! 模拟服务端对每一步回 `SubSuccess`，最后一步由控制器提升为 `Success`。
//!
//! ```bash
//! cargo run -p perseus-sdk --example path_control --features mock
//! ```

use perseus_sdk::net::mock::MockChannel;
use perseus_sdk::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    perseus_sdk::init_logging_with("path_control=info")?;

    let channel = Arc::new(MockChannel::with_responder(|req| {
        println!("   → step {}/{} ({})", req.step + 1, req.step_count, req.payload.kind());
        vec![StatusUpdate::new(req.command_id, ResponseStatus::SubSuccess)]
    }));
    let robot = PerseusRobot::new(channel)?;

    // ==================== 关节路径 ====================
    let joint1: JointArray = [0.4280, 30.0, 40.0, -1.0, 2.0, 30.0, 30.0, 30.0, 5.0];
    let joint2: JointArray = [0.4280, 30.0, 40.0, -1.0, 2.0, 30.0, 30.0, 0.0, 35.0];
    let path = RobotCommand::create_commands(
        [
            MotionCommand::create_command(joint1, Duration::from_secs(5)),
            MotionCommand::create_command(joint2, Duration::from_secs(5)),
        ],
        Duration::from_secs(30),
    )?;
    println!("🦾 关节路径: {} 个路径点, 超时 {:?}", path.cmd_size(), path.timeout_vec());
    let outcome = robot.control(ControllerMode::joint_position(), path)?;
    println!("   ✅ {}\n", outcome.status);

    // ==================== 夹爪 ====================
    let grip = RobotCommand::create_commands(
        [
            EndEffectorCommand::new(EndEffectorAction::Open, Duration::from_secs(5)),
            EndEffectorCommand::new(EndEffectorAction::ForceClose, Duration::from_secs(5)),
        ],
        Duration::from_secs(30),
    )?;
    println!("✋ 夹爪动作: {:?}", grip.ee_actions_vec_str());
    let outcome = robot.control(ControllerMode::task_command(), grip)?;
    println!("   ✅ {}", outcome.status);

    Ok(())
}
