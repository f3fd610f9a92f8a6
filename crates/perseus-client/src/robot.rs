//! 机器人门面
//!
//! [`PerseusRobot`] 为每种配置的控制模式持有一个 [`Controller`]，
//! 它们共享同一个命令 ID 生成器和同一个通道。
//! `control` 调用在门面互斥锁下串行执行并阻塞到动作结束。

use crate::command::RobotCommand;
use crate::config::ControllerConfig;
use crate::controller::{CommandIdGenerator, Controller, MotionOutcome};
use crate::error::ControlError;
use parking_lot::Mutex;
use perseus_net::{Channel, NetworkError};
use perseus_protocol::ControllerMode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 机器人门面
///
/// # 示例
///
/// ```rust
/// use perseus_client::{PerseusRobot, RobotCommand};
/// use perseus_net::mock::MockChannel;
/// use perseus_net::StatusUpdate;
/// use perseus_protocol::{ControllerMode, EndEffectorAction, EndEffectorCommand, ResponseStatus};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let channel = Arc::new(MockChannel::with_responder(|req| {
///     vec![StatusUpdate::new(req.command_id, ResponseStatus::Success)]
/// }));
/// let robot = PerseusRobot::new(channel)?;
///
/// let open = RobotCommand::create_command(EndEffectorCommand::new(
///     EndEffectorAction::Open,
///     Duration::from_secs(5),
/// ))?;
/// let outcome = robot.control(ControllerMode::task_command(), open)?;
/// assert_eq!(outcome.status, ResponseStatus::Success);
/// # Ok::<(), perseus_client::ControlError>(())
/// ```
pub struct PerseusRobot {
    controllers: HashMap<ControllerMode, Controller>,
    ids: Arc<CommandIdGenerator>,
    control_mutex: Mutex<()>,
}

impl PerseusRobot {
    /// 使用默认配置创建并绑定通道
    pub fn new(channel: Arc<dyn Channel>) -> Result<Self, ControlError> {
        Self::from_config(&ControllerConfig::default(), channel)
    }

    /// 按配置创建控制器并绑定通道
    pub fn from_config(
        config: &ControllerConfig,
        channel: Arc<dyn Channel>,
    ) -> Result<Self, ControlError> {
        if config.modes.is_empty() {
            return Err(ControlError::Config("at least one controller mode is required".into()));
        }

        let ids = Arc::new(CommandIdGenerator::new());
        let mut controllers = HashMap::with_capacity(config.modes.len());
        for &mode in &config.modes {
            let controller = Controller::with_options(mode, ids.clone(), config)?;
            controller.bind_network(channel.clone())?;
            controllers.insert(mode, controller);
        }
        info!(modes = controllers.len(), "robot controllers ready");

        Ok(Self {
            controllers,
            ids,
            control_mutex: Mutex::new(()),
        })
    }

    /// 执行一条组合命令并阻塞到结束
    ///
    /// # 错误
    /// - `ControlError::InvalidOperation`: 模式未配置、与命令不兼容、已有命令在执行，
    ///   或在等待回调中调用
    /// - `ControlError::Network`: 通道未连接或发送失败，以及执行中途的网络错误
    /// - `ControlError::Command`: 远端报告 `Fail` / `Abort`
    ///
    /// `Refused`、`Timeout`、`UserStop` 作为正常结果返回。
    pub fn control(
        &self,
        mode: ControllerMode,
        command: RobotCommand,
    ) -> Result<MotionOutcome, ControlError> {
        // 回调运行时外层 control 仍持有门面锁
        if self.controllers.values().any(Controller::is_worker_thread) {
            return Err(ControlError::InvalidOperation(
                "cannot call control from a waiting callback".to_string(),
            ));
        }
        let _guard = self.control_mutex.lock();
        let controller = self.controller_for(mode)?;

        debug!(%mode, steps = command.cmd_size(), "control requested");
        let handle = controller
            .execute_motion(mode, command)?
            .ok_or(ControlError::Network(NetworkError::NotConnected))?;
        handle.wait()?.into_result()
    }

    /// 停止所有控制器的当前动作（不获取门面锁）
    ///
    /// 返回是否有动作被停止。
    pub fn stop(&self) -> bool {
        self.controllers
            .values()
            .fold(false, |stopped, controller| controller.stop() || stopped)
    }

    pub fn set_waiting_callback<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        for controller in self.controllers.values() {
            let callback = callback.clone();
            controller.set_waiting_callback(move |elapsed| callback(elapsed));
        }
    }

    /// 是否有任一控制器在执行
    pub fn is_controller_running(&self) -> bool {
        self.controllers.values().any(Controller::is_controller_running)
    }

    /// 为所有控制器重新绑定通道
    ///
    /// 要么全部切换，要么一个都不切换。
    ///
    /// # 错误
    /// - `ControlError::InvalidOperation`: 任一控制器正在执行
    pub fn bind_network(&self, channel: Arc<dyn Channel>) -> Result<(), ControlError> {
        let Some(_guard) = self.control_mutex.try_lock() else {
            return Err(ControlError::InvalidOperation(
                "cannot bind network while a command is running".to_string(),
            ));
        };

        let mut reserved: Vec<&Controller> = Vec::with_capacity(self.controllers.len());
        for (mode, controller) in &self.controllers {
            if !controller.try_reserve() {
                for held in &reserved {
                    held.release();
                }
                return Err(ControlError::InvalidOperation(format!(
                    "cannot bind network while the {mode} controller is running"
                )));
            }
            reserved.push(controller);
        }

        for controller in &reserved {
            controller.attach_channel(channel.clone());
        }
        for controller in &reserved {
            controller.release();
        }
        info!(controllers = reserved.len(), "network channel rebound");
        Ok(())
    }

    pub fn controller(&self, mode: ControllerMode) -> Option<&Controller> {
        self.controllers.get(&mode)
    }

    pub fn modes(&self) -> impl Iterator<Item = ControllerMode> + '_ {
        self.controllers.keys().copied()
    }

    /// 共享生成器上的下一个命令 ID
    pub fn generate_command_id(&self) -> perseus_net::CommandId {
        self.ids.next()
    }

    fn controller_for(&self, mode: ControllerMode) -> Result<&Controller, ControlError> {
        self.controllers.get(&mode).ok_or_else(|| {
            ControlError::InvalidOperation(format!("no controller configured for mode {mode}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use perseus_net::StatusUpdate;
    use perseus_net::mock::MockChannel;
    use perseus_protocol::{JOINT_NUM, MotionCommand, ResponseStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    fn auto_channel(status: ResponseStatus) -> Arc<MockChannel> {
        Arc::new(MockChannel::with_responder(move |req| {
            vec![StatusUpdate::new(req.command_id, status)]
        }))
    }

    fn joint_command() -> RobotCommand {
        RobotCommand::create_command(MotionCommand::create_command(
            [0.2; JOINT_NUM],
            Duration::from_secs(5),
        ))
        .unwrap()
    }

    #[test]
    fn test_control_success_shares_ids() {
        let channel = auto_channel(ResponseStatus::Success);
        let robot = PerseusRobot::new(channel.clone()).unwrap();

        let first = robot.control(ControllerMode::joint_position(), joint_command()).unwrap();
        let second = robot.control(ControllerMode::joint_position(), joint_command()).unwrap();
        assert_eq!(first.status, ResponseStatus::Success);
        assert!(second.command_id > first.command_id);
        assert_eq!(channel.sent_count(), 2);
        assert!(!robot.is_controller_running());
    }

    #[test]
    fn test_control_unconfigured_mode() {
        let robot = PerseusRobot::new(auto_channel(ResponseStatus::Success)).unwrap();
        let err = robot
            .control(ControllerMode::joint_torque(), joint_command())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_control_not_connected() {
        let channel = auto_channel(ResponseStatus::Success);
        channel.set_connected(false);
        let robot = PerseusRobot::new(channel).unwrap();
        let err = robot
            .control(ControllerMode::joint_position(), joint_command())
            .unwrap_err();
        assert_eq!(err, ControlError::Network(NetworkError::NotConnected));
    }

    #[test]
    fn test_control_fail_is_command_error() {
        let robot = PerseusRobot::new(auto_channel(ResponseStatus::Fail)).unwrap();
        let err = robot
            .control(ControllerMode::joint_position(), joint_command())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
    }

    #[test]
    fn test_stop_from_other_thread() {
        let channel = Arc::new(MockChannel::new());
        let robot = Arc::new(PerseusRobot::new(channel.clone()).unwrap());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        robot.set_waiting_callback(move |_| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
        });

        let robot_clone = robot.clone();
        let worker =
            thread::spawn(move || robot_clone.control(ControllerMode::joint_position(), joint_command()));

        assert!(channel.wait_for_sent(1, Duration::from_secs(5)));
        // 执行中不允许重新绑定
        let err = robot.bind_network(Arc::new(MockChannel::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        assert!(robot.stop());
        let outcome = worker.join().unwrap().unwrap();
        assert_eq!(outcome.status, ResponseStatus::UserStop);
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        robot.bind_network(Arc::new(MockChannel::new())).unwrap();
    }

    #[test]
    fn test_from_config_modes() {
        let config = ControllerConfig {
            modes: vec![ControllerMode::joint_torque()],
            ..ControllerConfig::default()
        };
        let robot = PerseusRobot::from_config(&config, auto_channel(ResponseStatus::Success)).unwrap();
        assert_eq!(robot.modes().collect::<Vec<_>>(), vec![ControllerMode::joint_torque()]);
        assert!(robot.controller(ControllerMode::joint_torque()).is_some());
        assert!(robot.controller(ControllerMode::joint_position()).is_none());
    }
    #[test]
    fn test_bind_network_is_all_or_nothing() {
        let old = Arc::new(MockChannel::new());
        let robot = PerseusRobot::new(old.clone()).unwrap();
        assert_eq!(old.sink_count(), 2);

        // 绕过门面直接驱动一个控制器
        let task = robot.controller(ControllerMode::task_command()).unwrap();
        let gripper = RobotCommand::create_command(perseus_protocol::EndEffectorCommand::new(
            perseus_protocol::EndEffectorAction::Open,
            Duration::from_secs(5),
        ))
        .unwrap();
        let handle = task
            .execute_motion(ControllerMode::task_command(), gripper)
            .unwrap()
            .unwrap();

        let new = Arc::new(MockChannel::new());
        let err = robot.bind_network(new.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(new.sink_count(), 0);
        assert!(robot.controller(ControllerMode::joint_position()).unwrap().is_bound());
        assert!(!robot.controller(ControllerMode::joint_position()).unwrap().is_controller_running());

        // 两个控制器仍挂在旧通道上
        assert_eq!(old.deliver(StatusUpdate::new(handle.command_id(), ResponseStatus::Success)), 2);
        assert_eq!(handle.wait().unwrap().status, ResponseStatus::Success);
        assert_eq!(old.sink_count(), 2);

        robot.bind_network(new.clone()).unwrap();
        assert_eq!(new.sink_count(), 2);
    }

    #[test]
    fn test_control_from_waiting_callback_rejected() {
        let channel = auto_channel(ResponseStatus::Success);
        let robot = Arc::new(PerseusRobot::new(channel.clone()).unwrap());
        let (tx, rx) = crossbeam_channel::unbounded();

        let weak = Arc::downgrade(&robot);
        robot.set_waiting_callback(move |_| {
            if let Some(robot) = weak.upgrade() {
                let result = robot.control(ControllerMode::joint_position(), joint_command());
                let _ = tx.send(result.map_err(|e| e.kind()).map(|o| o.status));
            }
        });

        let outcome = robot.control(ControllerMode::joint_position(), joint_command()).unwrap();
        assert_eq!(outcome.status, ResponseStatus::Success);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(ErrorKind::InvalidOperation)
        );
        assert_eq!(channel.sent_count(), 1);
    }
}
