//! 组合命令（RobotCommand）
//!
//! 一个有序、有界（1..=20）的子命令列表，附带总超时和执行游标。
//!
//! # 可变性
//!
//! 子命令列表在构造后不可变；执行期间只有游标、结束标志和状态会变化，
//! 且只由控制器工作线程写入。调用方线程可以通过 [`MotionHandle`](crate::MotionHandle)
//! 并发读取这些字段（原子变量 / `parking_lot::Mutex`）。

use crate::error::ControlError;
use parking_lot::Mutex;
use perseus_net::CommandId;
use perseus_protocol::{
    CMD_LIST_SIZE, DEFAULT_TOTAL_TIMEOUT, JointArray, MotionCommand, RefusedReason,
    ResponseStatus, SubCommand,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
struct StatusCell {
    status: ResponseStatus,
    refused_reason: Option<RefusedReason>,
}

/// 组合命令
#[derive(Debug)]
pub struct RobotCommand {
    command_id: CommandId,
    commands: Vec<SubCommand>,
    total_timeout: Duration,
    current_index: AtomicUsize,
    finished: AtomicBool,
    status: Mutex<StatusCell>,
}

impl RobotCommand {
    fn build(commands: Vec<SubCommand>, total_timeout: Duration) -> Result<Self, ControlError> {
        let n = commands.len();
        if n == 0 || n > CMD_LIST_SIZE {
            return Err(ControlError::Construction(format!(
                "command list must contain 1..={CMD_LIST_SIZE} entries, got {n}"
            )));
        }
        for (step, sub) in commands.iter().enumerate() {
            sub.validate().map_err(|e| {
                ControlError::Construction(format!("step {step} ({}): {e}", sub.kind()))
            })?;
        }

        Ok(Self {
            command_id: CommandId::UNASSIGNED,
            commands,
            total_timeout,
            current_index: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            status: Mutex::new(StatusCell::default()),
        })
    }

    /// 由子命令序列创建组合命令
    ///
    /// # 错误
    /// - `ControlError::Construction`: 序列为空、超过 [`CMD_LIST_SIZE`] 条或含非有限数值
    ///
    /// # 示例
    ///
    /// ```rust
    /// use perseus_client::RobotCommand;
    /// use perseus_protocol::{EndEffectorAction, EndEffectorCommand};
    /// use std::time::Duration;
    ///
    /// let cmd = RobotCommand::create_commands(
    ///     [
    ///         EndEffectorCommand::new(EndEffectorAction::Open, Duration::from_secs(5)),
    ///         EndEffectorCommand::new(EndEffectorAction::ForceClose, Duration::from_secs(5)),
    ///     ],
    ///     Duration::from_secs(30),
    /// )?;
    /// assert_eq!(cmd.cmd_size(), 2);
    /// # Ok::<(), perseus_client::ControlError>(())
    /// ```
    pub fn create_commands<I, C>(sequence: I, total_timeout: Duration) -> Result<Self, ControlError>
    where
        I: IntoIterator<Item = C>,
        C: Into<SubCommand>,
    {
        Self::build(sequence.into_iter().map(Into::into).collect(), total_timeout)
    }

    /// 由子命令序列创建组合命令，总超时取默认值（30s）
    pub fn from_sequence<I, C>(sequence: I) -> Result<Self, ControlError>
    where
        I: IntoIterator<Item = C>,
        C: Into<SubCommand>,
    {
        Self::create_commands(sequence, DEFAULT_TOTAL_TIMEOUT)
    }

    /// 由单个子命令创建，总超时等于该子命令的超时
    pub fn create_command(command: impl Into<SubCommand>) -> Result<Self, ControlError> {
        let command = command.into();
        let total_timeout = command.timeout();
        Self::build(vec![command], total_timeout)
    }

    /// 单步关节位置命令
    pub fn joint_position(desired: JointArray, timeout: Duration) -> Result<Self, ControlError> {
        Self::create_command(MotionCommand::create_command(desired, timeout))
    }

    /// 预先指定命令 ID（否则由控制器在启动时分配）
    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        self.command_id = command_id;
        self
    }

    pub(crate) fn assign_id_if_unset(&mut self, assign: impl FnOnce() -> CommandId) -> CommandId {
        if !self.command_id.is_assigned() {
            self.command_id = assign();
        }
        self.command_id
    }

    // ==================== 基本属性 ====================

    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    pub fn cmd_size(&self) -> usize {
        self.commands.len()
    }

    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }

    pub fn commands(&self) -> &[SubCommand] {
        &self.commands
    }

    // ==================== 迭代游标 ====================

    /// 游标是否还未走完列表
    pub fn has_next(&self) -> bool {
        self.current_index() < self.commands.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::Acquire)
    }

    /// 游标处的子命令
    ///
    /// # 错误
    /// - `ControlError::Control`: 游标已越界
    pub fn current(&self) -> Result<&SubCommand, ControlError> {
        let index = self.current_index();
        self.commands.get(index).ok_or_else(|| {
            ControlError::Control(format!(
                "current_index {index} out of range (size {})",
                self.commands.len()
            ))
        })
    }

    /// 游标前进一步，到达末尾后不再变化
    pub fn advance(&self) {
        let len = self.commands.len();
        let _ = self
            .current_index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| (i < len).then_some(i + 1));
    }

    // ==================== 执行状态 ====================

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ResponseStatus {
        self.status.lock().status
    }

    pub fn refused_reason(&self) -> Option<RefusedReason> {
        self.status.lock().refused_reason
    }

    pub(crate) fn set_status(&self, status: ResponseStatus) {
        self.status.lock().status = status;
    }

    /// 写入终止状态并置位结束标志
    pub(crate) fn finish(&self, status: ResponseStatus, refused_reason: Option<RefusedReason>) {
        {
            let mut cell = self.status.lock();
            cell.status = status;
            cell.refused_reason = refused_reason;
        }
        self.finished.store(true, Ordering::Release);
    }

    // ==================== 只读投影 ====================

    /// 所有运动子命令的目标关节位置
    pub fn joint_positions_vec(&self) -> Vec<JointArray> {
        self.commands
            .iter()
            .filter_map(SubCommand::as_motion)
            .map(|m| m.joint_positions)
            .collect()
    }

    /// 每一步的超时
    pub fn timeout_vec(&self) -> Vec<Duration> {
        self.commands.iter().map(SubCommand::timeout).collect()
    }

    /// 所有末端执行器动作的名称
    pub fn ee_actions_vec_str(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(SubCommand::as_end_effector)
            .map(|e| e.ee_action.as_str().to_string())
            .collect()
    }
}
