//! 动作控制器
//!
//! 每个 [`Controller`] 对应一种控制模式，一次只执行一条 [`RobotCommand`]。
//!
//! # 线程模型
//!
//! ```text
//! 调用线程 ──execute_motion──┐
//! 调用线程 ──stop────────────┤
//! 通道回调 ──StatusSink──────┼──▶ crossbeam 队列 ──▶ 工作线程 (perseus-ctrl-N)
//! Drop ──────Shutdown────────┘                         │
//!                                                       └─▶ MotionOutcome ──▶ MotionHandle
//! ```
//!
//! - 运行标志 `running` 由调用线程通过 CAS 置位，由工作线程在结束时清除
//! - 绑定的通道保存在 `ArcSwapOption` 中，读取无锁
//! - 正在执行时再次提交或重新绑定通道会立即失败，不排队

mod handle;
mod id;
mod worker;

pub use handle::{MotionHandle, MotionOutcome};
pub use id::CommandIdGenerator;

use crate::command::RobotCommand;
use crate::config::ControllerConfig;
use crate::error::ControlError;
use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use perseus_net::{Channel, CommandId, StatusSink, StatusUpdate};
use perseus_protocol::ControllerMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, warn};
use worker::Worker;

/// 等待进度回调，参数为从启动到结束的秒数
pub type WaitingCallback = Arc<dyn Fn(f64) + Send + Sync>;

static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// 发往工作线程的事件
pub(crate) enum Event {
    Start {
        command: Arc<RobotCommand>,
        channel: Arc<dyn Channel>,
        reply: Sender<Result<bool, ControlError>>,
        done: Sender<MotionOutcome>,
    },
    Status(StatusUpdate),
    Stop,
    Shutdown,
}

/// 调用线程与工作线程共享的状态
pub(crate) struct Shared {
    running: AtomicBool,
    waiting_callback: RwLock<Option<WaitingCallback>>,
    bound: ArcSwapOption<BoundChannel>,
}

/// 已绑定的通道及其在通道上注册的接收端
struct BoundChannel {
    channel: Arc<dyn Channel>,
    sink: Arc<ControllerSink>,
}

/// 把通道回调转为工作线程事件
struct ControllerSink {
    tx: Sender<Event>,
    closed: AtomicBool,
}

impl ControllerSink {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl StatusSink for ControllerSink {
    fn on_status(&self, update: &StatusUpdate) {
        if self.tx.send(Event::Status(*update)).is_err() {
            self.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// 动作控制器
///
/// # 示例
///
/// ```rust
/// use perseus_client::{Controller, RobotCommand};
/// use perseus_net::mock::MockChannel;
/// use perseus_net::StatusUpdate;
/// use perseus_protocol::{ControllerMode, ResponseStatus, JOINT_NUM};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let channel = Arc::new(MockChannel::with_responder(|req| {
///     vec![StatusUpdate::new(req.command_id, ResponseStatus::Success)]
/// }));
/// let controller = Controller::new(ControllerMode::joint_position())?;
/// controller.bind_network(channel)?;
///
/// let cmd = RobotCommand::joint_position([0.0; JOINT_NUM], Duration::from_secs(5))?;
/// let handle = controller
///     .execute_motion(ControllerMode::joint_position(), cmd)?
///     .expect("mock channel is connected");
/// assert_eq!(handle.wait()?.status, ResponseStatus::Success);
/// # Ok::<(), perseus_client::ControlError>(())
/// ```
pub struct Controller {
    mode: ControllerMode,
    ids: Arc<CommandIdGenerator>,
    shared: Arc<Shared>,
    tx: Sender<Event>,
    worker: Option<JoinHandle<()>>,
    worker_thread: ThreadId,
}

impl Controller {
    /// 使用独立 ID 生成器和默认配置创建控制器
    pub fn new(mode: ControllerMode) -> Result<Self, ControlError> {
        Self::with_options(
            mode,
            Arc::new(CommandIdGenerator::new()),
            &ControllerConfig::default(),
        )
    }

    /// 创建控制器
    ///
    /// 同一机器人下的多个控制器应共享同一个 `ids`。
    ///
    /// # 错误
    /// - `ControlError::InvalidOperation`: 模式含 `Unknown`
    /// - `ControlError::Control`: 工作线程创建失败
    pub fn with_options(
        mode: ControllerMode,
        ids: Arc<CommandIdGenerator>,
        config: &ControllerConfig,
    ) -> Result<Self, ControlError> {
        if !mode.is_known() {
            return Err(ControlError::InvalidOperation(format!(
                "cannot create controller for mode {mode}"
            )));
        }

        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            waiting_callback: RwLock::new(None),
            bound: ArcSwapOption::empty(),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Worker::new(
            rx,
            shared.clone(),
            mode,
            config.cancel_on_stop,
            Duration::from_millis(config.timeout_margin_ms),
        );

        let name = format!("perseus-ctrl-{}", WORKER_SEQ.fetch_add(1, Ordering::Relaxed));
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())
            .map_err(|e| ControlError::Control(format!("failed to spawn controller worker: {e}")))?;

        Ok(Self {
            mode,
            ids,
            shared,
            tx,
            worker_thread: handle.thread().id(),
            worker: Some(handle),
        })
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// 提交一条组合命令
    ///
    /// - `Ok(Some(handle))`: 第一步已被通道接受
    /// - `Ok(None)`: 未绑定通道或通道未连接（静默拒绝，控制器回到空闲）
    ///
    /// # 错误
    /// - `ControlError::InvalidOperation`: 模式不匹配、子命令与模式不兼容、已有命令在执行，
    ///   或在本控制器的等待回调中调用
    /// - `ControlError::Network`: 通道发送异常
    pub fn execute_motion(
        &self,
        mode: ControllerMode,
        mut command: RobotCommand,
    ) -> Result<Option<MotionHandle>, ControlError> {
        // 工作线程无法等待自己的启动应答
        if self.is_worker_thread() {
            return Err(ControlError::InvalidOperation(
                "cannot execute a motion from this controller's waiting callback".to_string(),
            ));
        }
        if mode != self.mode {
            return Err(ControlError::InvalidOperation(format!(
                "mode {mode} does not match controller mode {}",
                self.mode
            )));
        }
        if let Some(sub) = command.commands().iter().find(|c| !mode.accepts(c.kind())) {
            return Err(ControlError::InvalidOperation(format!(
                "mode {mode} cannot execute {} sub-commands",
                sub.kind()
            )));
        }

        let Some(bound) = self.shared.bound.load_full() else {
            debug!(mode = %self.mode, "no channel bound, motion not started");
            return Ok(None);
        };

        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControlError::InvalidOperation(
                "another command is already running".to_string(),
            ));
        }

        command.assign_id_if_unset(|| self.ids.next());
        let command = Arc::new(command);
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let start = Event::Start {
            command: command.clone(),
            channel: bound.channel.clone(),
            reply: reply_tx,
            done: done_tx,
        };
        if self.tx.send(start).is_err() {
            self.shared.running.store(false, Ordering::Release);
            return Err(ControlError::Control("controller worker is not running".to_string()));
        }

        match reply_rx.recv() {
            Ok(Ok(true)) => Ok(Some(MotionHandle::new(command, done_rx))),
            Ok(Ok(false)) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.shared.running.store(false, Ordering::Release);
                Err(ControlError::Control("controller worker exited during start".to_string()))
            },
        }
    }

    /// 请求停止当前动作（非阻塞）
    ///
    /// 返回调用时是否有动作在执行。动作以 `UserStop` 结束，等待中的
    /// [`MotionHandle`] 会收到正常的终止结果。
    pub fn stop(&self) -> bool {
        let running = self.is_controller_running();
        if running && self.tx.send(Event::Stop).is_err() {
            warn!(mode = %self.mode, "controller worker is gone, stop ignored");
        }
        running
    }

    /// 是否有动作在执行（非阻塞）
    pub fn is_controller_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// 设置等待进度回调（在工作线程中调用）
    pub fn set_waiting_callback<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        *self.shared.waiting_callback.write() = Some(Arc::new(callback));
    }

    pub fn clear_waiting_callback(&self) {
        *self.shared.waiting_callback.write() = None;
    }

    /// 绑定（或替换）通道
    ///
    /// # 错误
    /// - `ControlError::InvalidOperation`: 有动作正在执行
    pub fn bind_network(&self, channel: Arc<dyn Channel>) -> Result<(), ControlError> {
        if !self.try_reserve() {
            return Err(ControlError::InvalidOperation(
                "cannot bind network while a command is running".to_string(),
            ));
        }
        self.attach_channel(channel);
        self.release();
        Ok(())
    }

    /// 占用运行标志，与 execute_motion 互斥
    pub(crate) fn try_reserve(&self) -> bool {
        self.shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    /// 替换通道；调用方须已通过 `try_reserve` 占用运行标志
    pub(crate) fn attach_channel(&self, channel: Arc<dyn Channel>) {
        let sink = Arc::new(ControllerSink {
            tx: self.tx.clone(),
            closed: AtomicBool::new(false),
        });
        channel.attach(sink.clone());
        let previous = self.shared.bound.swap(Some(Arc::new(BoundChannel { channel, sink })));
        if let Some(previous) = previous {
            previous.sink.close();
        }
        debug!(mode = %self.mode, "network channel bound");
    }

    /// 当前线程是否为本控制器的工作线程
    pub(crate) fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_thread
    }

    pub fn is_bound(&self) -> bool {
        self.shared.bound.load().is_some()
    }

    /// 从共享生成器分配一个命令 ID
    pub fn generate_command_id(&self) -> CommandId {
        self.ids.next()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(bound) = self.shared.bound.swap(None) {
            bound.sink.close();
        }
        let _ = self.tx.send(Event::Shutdown);

        if let Some(handle) = self.worker.take() {
            // 等待回调里丢弃控制器时不能 join 自身
            if self.is_worker_thread() {
                return;
            }
            if handle.join().is_err() {
                warn!(mode = %self.mode, "controller worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("mode", &self.mode)
            .field("running", &self.is_controller_running())
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use perseus_net::mock::MockChannel;
    use perseus_protocol::{
        EndEffectorAction, EndEffectorCommand, JOINT_NUM, MotionCommand, RefusedReason,
        ResponseStatus,
    };
    use std::sync::atomic::AtomicU32;

    const WAIT: Duration = Duration::from_secs(5);

    fn motion(secs: u64) -> MotionCommand {
        MotionCommand::create_command([0.1; JOINT_NUM], Duration::from_secs(secs))
    }

    fn bound_controller(mode: ControllerMode) -> (Controller, Arc<MockChannel>) {
        let controller = Controller::new(mode).unwrap();
        let channel = Arc::new(MockChannel::new());
        controller.bind_network(channel.clone()).unwrap();
        (controller, channel)
    }

    #[test]
    fn test_two_step_sequence_success() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        controller.set_waiting_callback(move |elapsed| {
            assert!(elapsed >= 0.0);
            calls_clone.fetch_add(1, Ordering::Relaxed);
        });

        let cmd = RobotCommand::create_commands([motion(5), motion(5)], Duration::from_secs(30)).unwrap();
        let handle = controller
            .execute_motion(ControllerMode::joint_position(), cmd)
            .unwrap()
            .unwrap();
        let id = handle.command_id();
        assert!(id.is_assigned());
        assert!(controller.is_controller_running());

        channel.deliver(StatusUpdate::new(id, ResponseStatus::SubSuccess));
        assert!(channel.wait_for_sent(2, WAIT));
        assert_eq!(channel.last_sent().unwrap().step, 1);
        channel.deliver(StatusUpdate::new(id, ResponseStatus::Success));

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.status, ResponseStatus::Success);
        assert_eq!(outcome.completed_steps, 2);
        assert!(handle.command().is_finished());
        assert_eq!(handle.command().current_index(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(!controller.is_controller_running());
    }

    #[test]
    fn test_refused_stops_sequence() {
        let (controller, channel) = bound_controller(ControllerMode::task_command());
        let cmd = RobotCommand::create_command(EndEffectorCommand::new(
            EndEffectorAction::Open,
            Duration::from_secs(5),
        ))
        .unwrap();
        let handle = controller
            .execute_motion(ControllerMode::task_command(), cmd)
            .unwrap()
            .unwrap();

        channel.deliver(StatusUpdate::refused(handle.command_id(), RefusedReason::RobotBusy));
        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.status, ResponseStatus::Refused);
        assert_eq!(outcome.refused_reason, Some(RefusedReason::RobotBusy));
        assert_eq!(handle.command().refused_reason(), Some(RefusedReason::RobotBusy));
        assert_eq!(channel.sent_count(), 1);
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let cmd = RobotCommand::create_command(motion(1)).unwrap();
        let err = controller
            .execute_motion(ControllerMode::task_command(), cmd)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let gripper = RobotCommand::create_command(EndEffectorCommand::new(
            EndEffectorAction::Close,
            Duration::from_secs(1),
        ))
        .unwrap();
        let err = controller
            .execute_motion(ControllerMode::joint_position(), gripper)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(channel.sent_count(), 0);
        assert!(!controller.is_controller_running());
    }

    #[test]
    fn test_double_execute_rejected() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let first = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap()
            .unwrap();

        let err = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(first.command().status(), ResponseStatus::Waiting);
        assert!(!first.command().is_finished());

        channel.deliver(StatusUpdate::new(first.command_id(), ResponseStatus::Success));
        assert_eq!(first.wait().unwrap().status, ResponseStatus::Success);
    }

    #[test]
    fn test_step_timeout() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let cmd = RobotCommand::create_command(MotionCommand::create_command(
            [0.0; JOINT_NUM],
            Duration::from_millis(30),
        ))
        .unwrap();
        let handle = controller
            .execute_motion(ControllerMode::joint_position(), cmd)
            .unwrap()
            .unwrap();

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.status, ResponseStatus::Timeout);
        assert!(outcome.elapsed >= Duration::from_millis(30));

        // 迟到的帧被忽略
        assert_eq!(channel.deliver(StatusUpdate::new(outcome.command_id, ResponseStatus::Success)), 1);
        assert_eq!(handle.command().status(), ResponseStatus::Timeout);
    }

    #[test]
    fn test_stop_yields_user_stop() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        assert!(!controller.stop());

        let handle = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert!(controller.stop());

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.status, ResponseStatus::UserStop);
        assert_eq!(channel.cancelled(), vec![outcome.command_id]);
    }

    #[test]
    fn test_not_connected_returns_none() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        channel.set_connected(false);
        let result = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(1)).unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
        assert!(!controller.is_controller_running());

        let unbound = Controller::new(ControllerMode::joint_position()).unwrap();
        let result = unbound
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(1)).unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_send_failure_is_network_error() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        channel.set_fail_sends(true);
        let err = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(1)).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(!controller.is_controller_running());
    }

    #[test]
    fn test_bind_while_running_rejected() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let handle = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap()
            .unwrap();

        let err = controller.bind_network(Arc::new(MockChannel::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        controller.stop();
        handle.wait().unwrap();
        controller.bind_network(Arc::new(MockChannel::new())).unwrap();

        // 旧通道上的接收端已关闭，下次分发时被移除
        channel.deliver(StatusUpdate::new(CommandId(1), ResponseStatus::Waiting));
        assert_eq!(channel.sink_count(), 0);
    }

    #[test]
    fn test_preset_command_id_is_kept() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let cmd = RobotCommand::create_command(motion(5))
            .unwrap()
            .with_command_id(CommandId(4242));
        let handle = controller
            .execute_motion(ControllerMode::joint_position(), cmd)
            .unwrap()
            .unwrap();
        assert_eq!(channel.last_sent().unwrap().command_id, CommandId(4242));

        channel.deliver(StatusUpdate::new(CommandId(4242), ResponseStatus::Abort));
        let err = handle.wait().unwrap().into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        use perseus_protocol::{ControlSpace, ControlType};
        let err = Controller::new(ControllerMode::new(ControlSpace::Unknown, ControlType::Position))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_drop_finishes_active_motion() {
        let (controller, _channel) = bound_controller(ControllerMode::joint_position());
        let handle = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap()
            .unwrap();
        drop(controller);
        assert_eq!(handle.wait().unwrap().status, ResponseStatus::UserStop);
    }
    #[test]
    fn test_unbounded_timeout_keeps_worker_alive() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let cmd = RobotCommand::create_command(MotionCommand::create_command(
            [0.0; JOINT_NUM],
            Duration::MAX,
        ))
        .unwrap();
        let handle = controller
            .execute_motion(ControllerMode::joint_position(), cmd)
            .unwrap()
            .unwrap();
        assert!(handle.wait_timeout(Duration::from_millis(50)).unwrap().is_none());
        assert!(controller.stop());
        assert_eq!(handle.wait().unwrap().status, ResponseStatus::UserStop);

        let next = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(1)).unwrap(),
            )
            .unwrap()
            .unwrap();
        channel.deliver(StatusUpdate::new(next.command_id(), ResponseStatus::Success));
        assert_eq!(next.wait().unwrap().status, ResponseStatus::Success);
        assert_eq!(channel.sent_count(), 2);
    }

    #[test]
    fn test_execute_from_waiting_callback_rejected() {
        let (controller, channel) = bound_controller(ControllerMode::joint_position());
        let controller = Arc::new(controller);
        let (tx, rx) = crossbeam_channel::unbounded();

        let weak = Arc::downgrade(&controller);
        controller.set_waiting_callback(move |_| {
            if let Some(controller) = weak.upgrade() {
                let result = controller.execute_motion(
                    ControllerMode::joint_position(),
                    RobotCommand::create_command(motion(1)).unwrap(),
                );
                let _ = tx.send(result.map(|h| h.is_some()).map_err(|e| e.kind()));
            }
        });

        let handle = controller
            .execute_motion(
                ControllerMode::joint_position(),
                RobotCommand::create_command(motion(5)).unwrap(),
            )
            .unwrap()
            .unwrap();
        channel.deliver(StatusUpdate::new(handle.command_id(), ResponseStatus::Success));

        let outcome = handle.wait_timeout(WAIT).unwrap().expect("outcome delivered");
        assert_eq!(outcome.status, ResponseStatus::Success);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Err(ErrorKind::InvalidOperation));
        assert_eq!(channel.sent_count(), 1);
        assert!(!controller.is_controller_running());
    }
}
