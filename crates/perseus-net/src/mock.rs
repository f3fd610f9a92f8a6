//! 进程内 Mock 通道
//!
//! 用于测试和演示的模拟通道，不需要真实的机器人服务端。
//!
//! - 记录所有发送的 [`CommandRequest`]
//! - 可模拟未连接（`send` 返回 `Ok(false)`）和发送异常（`send` 返回 `Err`）
//! - 可注入状态帧（[`MockChannel::deliver`]），或设置自动应答器
//!
//! # 示例
//!
//! ```rust
//! use perseus_net::mock::MockChannel;
//! use perseus_net::StatusUpdate;
//! use perseus_protocol::ResponseStatus;
//!
//! // 每一步都回 SubSuccess
//! let channel = MockChannel::with_responder(|req| {
//!     vec![StatusUpdate::new(req.command_id, ResponseStatus::SubSuccess)]
//! });
//! assert!(channel.sent().is_empty());
//! ```

use crate::{Channel, CommandId, CommandRequest, NetworkError, SinkRegistry, StatusSink, StatusUpdate};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type Responder = Box<dyn FnMut(&CommandRequest) -> Vec<StatusUpdate> + Send>;

/// 进程内模拟通道
pub struct MockChannel {
    connected: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<CommandRequest>>,
    sent_cond: Condvar,
    cancelled: Mutex<Vec<CommandId>>,
    responder: Mutex<Option<Responder>>,
    sinks: SinkRegistry,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    /// 创建已连接、无自动应答的通道
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            sent_cond: Condvar::new(),
            cancelled: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            sinks: SinkRegistry::new(),
        }
    }

    /// 创建带自动应答器的通道
    ///
    /// 每次 `send` 被接受后调用应答器，返回的状态帧立即分发。
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&CommandRequest) -> Vec<StatusUpdate> + Send + 'static,
    {
        let channel = Self::new();
        *channel.responder.lock() = Some(Box::new(responder));
        channel
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// 模拟协议损坏：之后的 `send` 全部返回错误
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// 注入一帧状态
    pub fn deliver(&self, update: StatusUpdate) -> usize {
        self.sinks.dispatch(&update)
    }

    /// 已发送请求的快照
    pub fn sent(&self) -> Vec<CommandRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// 最近一次发送的请求
    pub fn last_sent(&self) -> Option<CommandRequest> {
        self.sent.lock().last().cloned()
    }

    /// 阻塞直到累计发送数达到 `count`，超时返回 `false`
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut sent = self.sent.lock();
        while sent.len() < count {
            if self.sent_cond.wait_until(&mut sent, deadline).timed_out() {
                return sent.len() >= count;
            }
        }
        true
    }

    pub fn cancelled(&self) -> Vec<CommandId> {
        self.cancelled.lock().clone()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Channel for MockChannel {
    fn send(&self, request: &CommandRequest) -> Result<bool, NetworkError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(NetworkError::Protocol("mock send failure".to_string()));
        }
        if !self.connected.load(Ordering::Relaxed) {
            return Ok(false);
        }

        {
            let mut sent = self.sent.lock();
            sent.push(request.clone());
            self.sent_cond.notify_all();
        }

        // 应答器在锁外分发，回调可以重入通道
        let replies = match self.responder.lock().as_mut() {
            Some(responder) => responder(request),
            None => Vec::new(),
        };
        for update in replies {
            self.sinks.dispatch(&update);
        }
        Ok(true)
    }

    fn attach(&self, sink: Arc<dyn StatusSink>) {
        self.sinks.attach(sink);
    }

    fn cancel(&self, command_id: CommandId) -> Result<(), NetworkError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(NetworkError::NotConnected);
        }
        self.cancelled.lock().push(command_id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perseus_protocol::{EndEffectorAction, EndEffectorCommand, ResponseStatus, SubCommand};
    use std::sync::atomic::AtomicUsize;

    fn request(id: u32) -> CommandRequest {
        CommandRequest {
            command_id: CommandId(id),
            step: 0,
            step_count: 1,
            payload: SubCommand::from(EndEffectorCommand::new(
                EndEffectorAction::Open,
                Duration::from_secs(1),
            )),
            step_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_send_records_requests() {
        let channel = MockChannel::new();
        assert_eq!(channel.send(&request(1)), Ok(true));
        assert_eq!(channel.send(&request(2)), Ok(true));
        assert_eq!(channel.sent_count(), 2);
        assert_eq!(channel.last_sent().unwrap().command_id, CommandId(2));
    }

    #[test]
    fn test_disconnected_send_is_silent_reject() {
        let channel = MockChannel::new();
        channel.set_connected(false);
        assert_eq!(channel.send(&request(1)), Ok(false));
        assert_eq!(channel.sent_count(), 0);
        assert!(!channel.is_connected());
        assert_eq!(channel.cancel(CommandId(1)), Err(NetworkError::NotConnected));
    }

    #[test]
    fn test_fail_sends_raises() {
        let channel = MockChannel::new();
        channel.set_fail_sends(true);
        assert!(matches!(channel.send(&request(1)), Err(NetworkError::Protocol(_))));
    }

    #[test]
    fn test_responder_dispatches_to_sinks() {
        let channel = MockChannel::with_responder(|req| {
            vec![StatusUpdate::new(req.command_id, ResponseStatus::Success)]
        });
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        channel.attach(Arc::new(move |update: &StatusUpdate| {
            assert_eq!(update.status(), ResponseStatus::Success);
            hits_clone.fetch_add(1, Ordering::Relaxed);
        }));

        channel.send(&request(5)).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_wait_for_sent_times_out() {
        let channel = MockChannel::new();
        assert!(!channel.wait_for_sent(1, Duration::from_millis(20)));
        channel.send(&request(1)).unwrap();
        assert!(channel.wait_for_sent(1, Duration::from_millis(20)));
    }
}
