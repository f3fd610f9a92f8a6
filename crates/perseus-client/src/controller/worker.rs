//! 控制器工作线程
//!
//! 工作线程是运行中命令的唯一所有者。启动请求、停止请求和通道回调的
//! 状态帧都经由同一个 crossbeam 队列送达，因此游标和结束标志的变化是线性化的。
//!
//! ```text
//! Idle ──Start──▶ Sending ──accepted──▶ Waiting ──SubSuccess──▶ Sending (下一步)
//!                                          │
//!                                          ├─ Success / 列表耗尽 ──▶ Success
//!                                          ├─ Fail/Abort/Refused ──▶ 立即结束
//!                                          ├─ Stop ───────────────▶ UserStop
//!                                          └─ 步超时/总超时 ───────▶ Timeout
//! ```

use super::{Event, Shared};
use crate::command::RobotCommand;
use crate::controller::handle::MotionOutcome;
use crate::error::ControlError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use perseus_net::{Channel, CommandRequest, NetworkError, StatusUpdate};
use perseus_protocol::{ControllerMode, RefusedReason, ResponseStatus};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 超时无法表示为 `Instant` 时使用的截止距离（约 30 年）
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

/// `now + timeout`，溢出时退化为远期截止时间
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// 运行中的命令
struct Active {
    command: Arc<RobotCommand>,
    channel: Arc<dyn Channel>,
    done: Sender<MotionOutcome>,
    started: Instant,
    total_deadline: Instant,
    step_deadline: Instant,
}

impl Active {
    fn deadline(&self) -> Instant {
        self.step_deadline.min(self.total_deadline)
    }
}

pub(super) struct Worker {
    rx: Receiver<Event>,
    shared: Arc<Shared>,
    mode: ControllerMode,
    cancel_on_stop: bool,
    timeout_margin: Duration,
    active: Option<Active>,
}

impl Worker {
    pub(super) fn new(
        rx: Receiver<Event>,
        shared: Arc<Shared>,
        mode: ControllerMode,
        cancel_on_stop: bool,
        timeout_margin: Duration,
    ) -> Self {
        Self {
            rx,
            shared,
            mode,
            cancel_on_stop,
            timeout_margin,
            active: None,
        }
    }

    pub(super) fn run(mut self) {
        debug!(mode = %self.mode, "controller worker started");
        loop {
            let event = match self.active.as_ref().map(Active::deadline) {
                None => match self.rx.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
                Some(deadline) => match self.rx.recv_deadline(deadline) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        self.on_timeout();
                        continue;
                    },
                    Err(RecvTimeoutError::Disconnected) => {
                        self.finish(ResponseStatus::UserStop, None, None);
                        break;
                    },
                },
            };

            match event {
                Event::Start {
                    command,
                    channel,
                    reply,
                    done,
                } => self.start(command, channel, reply, done),
                Event::Status(update) => self.on_status(update),
                Event::Stop => self.on_stop(),
                Event::Shutdown => {
                    self.on_stop();
                    break;
                },
            }
        }
        debug!(mode = %self.mode, "controller worker exited");
    }

    fn start(
        &mut self,
        command: Arc<RobotCommand>,
        channel: Arc<dyn Channel>,
        reply: Sender<Result<bool, ControlError>>,
        done: Sender<MotionOutcome>,
    ) {
        if let Some(active) = &self.active {
            error!(
                running = %active.command.command_id(),
                rejected = %command.command_id(),
                "start requested while another command is active"
            );
            let _ = reply.send(Err(ControlError::InvalidOperation(format!(
                "command {} is already running",
                active.command.command_id()
            ))));
            return;
        }

        let started = Instant::now();
        let result = self.send_step(&command, channel.as_ref());
        let accepted = match result {
            Ok(true) => {
                let step_deadline = self.step_deadline(&command, started);
                info!(
                    command_id = %command.command_id(),
                    mode = %self.mode,
                    steps = command.cmd_size(),
                    total_timeout_ms = u64::try_from(command.total_timeout().as_millis()).unwrap_or(u64::MAX),
                    "motion started"
                );
                self.active = Some(Active {
                    total_deadline: deadline_after(started, command.total_timeout()),
                    step_deadline,
                    command,
                    channel,
                    done,
                    started,
                });
                Ok(true)
            },
            Ok(false) => {
                warn!(command_id = %command.command_id(), "channel rejected command (not connected)");
                command.set_status(ResponseStatus::Idle);
                self.shared.running.store(false, Ordering::Release);
                Ok(false)
            },
            Err(e) => {
                error!(command_id = %command.command_id(), error = %e, "failed to send command");
                command.set_status(ResponseStatus::Idle);
                self.shared.running.store(false, Ordering::Release);
                Err(ControlError::Network(e))
            },
        };
        let _ = reply.send(accepted);
    }

    /// 发送游标处的子命令：`Sending`，被接受后 `Waiting`
    fn send_step(&self, command: &RobotCommand, channel: &dyn Channel) -> Result<bool, NetworkError> {
        let payload = match command.current() {
            Ok(payload) => payload.clone(),
            Err(e) => {
                error!(command_id = %command.command_id(), error = %e, "no sub-command at cursor");
                return Ok(false);
            },
        };

        command.set_status(ResponseStatus::Sending);
        let request = CommandRequest {
            command_id: command.command_id(),
            step: command.current_index(),
            step_count: command.cmd_size(),
            step_timeout: payload.timeout(),
            total_timeout: command.total_timeout(),
            payload,
        };
        debug!(command_id = %request.command_id, step = request.step, "sending step");

        let accepted = channel.send(&request)?;
        if accepted {
            command.set_status(ResponseStatus::Waiting);
        }
        Ok(accepted)
    }

    fn step_deadline(&self, command: &RobotCommand, now: Instant) -> Instant {
        let step_timeout = command
            .current()
            .map(|c| c.timeout())
            .unwrap_or_else(|_| command.total_timeout());
        deadline_after(now, step_timeout.saturating_add(self.timeout_margin))
    }

    fn on_status(&mut self, update: StatusUpdate) {
        let Some(active) = &self.active else {
            debug!(command_id = %update.command_id, "ignoring status: no active command");
            return;
        };
        if update.command_id != active.command.command_id() {
            debug!(
                command_id = %update.command_id,
                active = %active.command.command_id(),
                "ignoring status for another command"
            );
            return;
        }

        let status = update.status();
        debug!(command_id = %update.command_id, %status, "status received");
        match status {
            ResponseStatus::Waiting => active.command.set_status(ResponseStatus::Waiting),
            ResponseStatus::SubSuccess => {
                active.command.advance();
                if !active.command.has_next() {
                    self.finish(ResponseStatus::Success, None, None);
                    return;
                }

                let command = active.command.clone();
                let channel = active.channel.clone();
                match self.send_step(&command, channel.as_ref()) {
                    Ok(true) => {
                        let deadline = self.step_deadline(&command, Instant::now());
                        if let Some(active) = &mut self.active {
                            active.step_deadline = deadline;
                        }
                    },
                    Ok(false) => {
                        self.finish(ResponseStatus::Fail, None, Some(NetworkError::NotConnected))
                    },
                    Err(e) => self.finish(ResponseStatus::Fail, None, Some(e)),
                }
            },
            ResponseStatus::Success => {
                active.command.advance();
                self.finish(ResponseStatus::Success, None, None);
            },
            ResponseStatus::Refused => {
                let reason = update.refused_reason.or(Some(RefusedReason::None));
                self.finish(ResponseStatus::Refused, reason, None);
            },
            s if s.is_action_finished() => self.finish(s, None, None),
            ResponseStatus::Unknown => {
                warn!(
                    command_id = %update.command_id,
                    raw = update.raw_status,
                    "ignoring unknown status code"
                );
            },
            other => {
                debug!(command_id = %update.command_id, status = %other, "ignoring local-only status");
            },
        }
    }

    fn on_timeout(&mut self) {
        if let Some(active) = &self.active {
            let now = Instant::now();
            let which = if now >= active.total_deadline { "total" } else { "step" };
            warn!(
                command_id = %active.command.command_id(),
                step = active.command.current_index(),
                which,
                "motion timed out"
            );
        }
        self.finish(ResponseStatus::Timeout, None, None);
    }

    fn on_stop(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        if self.cancel_on_stop {
            if let Err(e) = active.channel.cancel(active.command.command_id()) {
                warn!(command_id = %active.command.command_id(), error = %e, "cancel request failed");
            }
        }
        self.finish(ResponseStatus::UserStop, None, None);
    }

    /// 结束运行中的命令；没有运行中的命令时为空操作
    fn finish(
        &mut self,
        status: ResponseStatus,
        refused_reason: Option<RefusedReason>,
        network_error: Option<NetworkError>,
    ) {
        let Some(active) = self.active.take() else {
            return;
        };
        let command = active.command;
        command.finish(status, refused_reason);

        let elapsed = active.started.elapsed();
        let outcome = MotionOutcome {
            command_id: command.command_id(),
            status,
            refused_reason,
            completed_steps: command.current_index(),
            step_count: command.cmd_size(),
            elapsed,
            network_error,
        };
        self.shared.running.store(false, Ordering::Release);

        match (&outcome.refused_reason, &outcome.network_error) {
            (Some(reason), _) => info!(
                command_id = %outcome.command_id,
                %status,
                %reason,
                elapsed_ms = elapsed.as_millis() as u64,
                "motion finished"
            ),
            (None, Some(e)) => error!(
                command_id = %outcome.command_id,
                %status,
                error = %e,
                "motion failed mid-sequence"
            ),
            (None, None) => info!(
                command_id = %outcome.command_id,
                %status,
                steps = outcome.completed_steps,
                elapsed_ms = elapsed.as_millis() as u64,
                "motion finished"
            ),
        }

        let callback = self.shared.waiting_callback.read().clone();
        if let Some(callback) = callback {
            callback(elapsed.as_secs_f64());
        }
        let _ = active.done.send(outcome);
    }
}
