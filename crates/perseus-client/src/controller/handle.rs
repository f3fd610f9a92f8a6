//! 运行中动作的句柄与终止结果

use crate::command::RobotCommand;
use crate::error::ControlError;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use perseus_net::{CommandId, NetworkError};
use perseus_protocol::{RefusedReason, ResponseStatus};
use std::sync::Arc;
use std::time::Duration;

/// 一次动作的终止结果
///
/// `Refused`、`Timeout`、`UserStop` 都是正常的终止结果，调用方应检查
/// [`status`](Self::status) 而不是依赖错误。
#[derive(Debug, Clone, PartialEq)]
pub struct MotionOutcome {
    pub command_id: CommandId,
    pub status: ResponseStatus,
    /// 仅在 `status == Refused` 时可能存在
    pub refused_reason: Option<RefusedReason>,
    /// 结束时游标位置
    pub completed_steps: usize,
    pub step_count: usize,
    /// 从启动到结束的耗时
    pub elapsed: Duration,
    /// 执行中途发生的网络错误
    pub network_error: Option<NetworkError>,
}

impl MotionOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.network_error.is_none()
    }

    /// 转换为 `Result`
    ///
    /// - 中途网络错误 → `ControlError::Network`
    /// - `Fail` / `Abort` → `ControlError::Command`
    /// - 其余终止状态原样返回
    pub fn into_result(self) -> Result<Self, ControlError> {
        if let Some(err) = self.network_error {
            return Err(ControlError::Network(err));
        }
        match self.status {
            ResponseStatus::Fail | ResponseStatus::Abort => Err(ControlError::Command {
                command_id: self.command_id,
                status: self.status,
                completed_steps: self.completed_steps,
            }),
            _ => Ok(self),
        }
    }
}

/// 已被通道接受的动作句柄
///
/// 支持阻塞等待（[`wait`](Self::wait)）、带超时等待和轮询。
/// 句柄被丢弃不会停止动作，停止需要调用 [`Controller::stop`](crate::Controller::stop)。
pub struct MotionHandle {
    command: Arc<RobotCommand>,
    done_rx: Receiver<MotionOutcome>,
    outcome: Mutex<Option<MotionOutcome>>,
}

impl MotionHandle {
    pub(crate) fn new(command: Arc<RobotCommand>, done_rx: Receiver<MotionOutcome>) -> Self {
        Self {
            command,
            done_rx,
            outcome: Mutex::new(None),
        }
    }

    /// 正在执行的组合命令（可并发读取游标和状态）
    pub fn command(&self) -> &Arc<RobotCommand> {
        &self.command
    }

    pub fn command_id(&self) -> CommandId {
        self.command.command_id()
    }

    /// 阻塞直到动作结束
    ///
    /// # 错误
    /// - `ControlError::Control`: 控制器工作线程已退出且未给出结果
    pub fn wait(&self) -> Result<MotionOutcome, ControlError> {
        let mut cached = self.outcome.lock();
        if let Some(outcome) = cached.as_ref() {
            return Ok(outcome.clone());
        }
        let outcome = self.done_rx.recv().map_err(|_| self.worker_gone())?;
        *cached = Some(outcome.clone());
        Ok(outcome)
    }

    /// 最多等待 `timeout`，未结束返回 `Ok(None)`
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<MotionOutcome>, ControlError> {
        let mut cached = self.outcome.lock();
        if let Some(outcome) = cached.as_ref() {
            return Ok(Some(outcome.clone()));
        }
        match self.done_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                *cached = Some(outcome.clone());
                Ok(Some(outcome))
            },
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.worker_gone()),
        }
    }

    /// 非阻塞查询
    pub fn try_outcome(&self) -> Option<MotionOutcome> {
        let mut cached = self.outcome.lock();
        if cached.is_none() {
            match self.done_rx.try_recv() {
                Ok(outcome) => *cached = Some(outcome),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {},
            }
        }
        cached.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.command.is_finished()
    }

    fn worker_gone(&self) -> ControlError {
        ControlError::Control(format!(
            "controller worker exited before command {} finished",
            self.command.command_id()
        ))
    }
}

impl std::fmt::Debug for MotionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionHandle")
            .field("command_id", &self.command.command_id())
            .field("current_index", &self.command.current_index())
            .field("status", &self.command.status())
            .finish()
    }
}
