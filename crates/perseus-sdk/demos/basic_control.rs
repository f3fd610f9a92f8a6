//! 基础控制示例
//!
//! 单步关节位置命令，服务端由进程内的模拟线程代替：
//! 收到请求后先回 `Waiting`，延迟一段时间再回 `Success`。
//!
//! ```bash
//! cargo run -p perseus-sdk --example basic_control --features mock
//! ```
//!
//! 运行中按 Ctrl-C 会停止当前动作（结果为 `User-Stop`）。

use perseus_sdk::net::mock::MockChannel;
use perseus_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    perseus_sdk::init_logging_with("basic_control=info")?;

    // 模拟服务端
    let (req_tx, req_rx) = crossbeam_channel::unbounded::<CommandId>();
    let channel = Arc::new(MockChannel::with_responder(move |req| {
        let _ = req_tx.send(req.command_id);
        Vec::new()
    }));
    let server_channel = channel.clone();
    thread::Builder::new().name("mock-server".into()).spawn(move || {
        for id in req_rx {
            server_channel.deliver(StatusUpdate::new(id, ResponseStatus::Waiting));
            thread::sleep(Duration::from_millis(800));
            server_channel.deliver(StatusUpdate::new(id, ResponseStatus::Success));
        }
    })?;

    let robot = Arc::new(PerseusRobot::new(channel)?);
    robot.set_waiting_callback(|elapsed| println!("⏱️  动作耗时 {elapsed:.3}s"));

    let stopper = robot.clone();
    ctrlc::set_handler(move || {
        if stopper.stop() {
            println!("\n🛑 已请求停止");
        }
    })?;

    let desired_joint: JointArray = [0.4280, 30.0, 40.0, -1.0, 2.0, 30.0, 30.0, 30.0, 5.0];
    let cmd = RobotCommand::joint_position(desired_joint, Duration::from_secs(10))?;
    println!("📤 发送关节位置命令: {:?}", cmd.joint_positions_vec()[0]);

    let outcome = robot.control(ControllerMode::joint_position(), cmd)?;
    println!(
        "✅ 命令 {} 结束: {} ({}/{} 步)",
        outcome.command_id, outcome.status, outcome.completed_steps, outcome.step_count
    );
    Ok(())
}
