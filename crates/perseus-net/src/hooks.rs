//! 状态回调注册表
//!
//! 通道实现持有一个 [`SinkRegistry`]，收到状态帧后调用 [`SinkRegistry::dispatch`]
//! 分发给所有已注册的 [`StatusSink`]。
//!
//! # 示例
//!
//! ```rust
//! use perseus_net::{CommandId, SinkRegistry, StatusUpdate};
//! use perseus_protocol::ResponseStatus;
//! use std::sync::Arc;
//!
//! let registry = SinkRegistry::new();
//! registry.attach(Arc::new(|update: &StatusUpdate| {
//!     println!("status {} for {}", update.status(), update.command_id);
//! }));
//!
//! let delivered = registry.dispatch(&StatusUpdate::new(CommandId(1), ResponseStatus::Waiting));
//! assert_eq!(delivered, 1);
//! ```

use crate::StatusUpdate;
use parking_lot::RwLock;
use std::sync::Arc;

/// 状态帧接收端
///
/// # 性能要求
///
/// - 非阻塞：实现应当只做入队（如 `crossbeam_channel::Sender::send`）
/// - `is_closed` 返回 `true` 后，注册表在下一次分发时将其移除
pub trait StatusSink: Send + Sync {
    fn on_status(&self, update: &StatusUpdate);

    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> StatusSink for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn on_status(&self, update: &StatusUpdate) {
        self(update)
    }
}

/// 状态回调注册表
#[derive(Default)]
pub struct SinkRegistry {
    sinks: RwLock<Vec<Arc<dyn StatusSink>>>,
}

impl SinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sink: Arc<dyn StatusSink>) {
        self.sinks.write().push(sink);
    }

    /// 分发状态帧，返回实际送达的接收端数量
    ///
    /// 回调在读锁之外执行，回调内部可以再次调用 `attach`。
    pub fn dispatch(&self, update: &StatusUpdate) -> usize {
        let sinks: Vec<_> = self.sinks.read().clone();
        let mut delivered = 0;
        for sink in &sinks {
            if sink.is_closed() {
                continue;
            }
            sink.on_status(update);
            delivered += 1;
        }

        if delivered < sinks.len() {
            let mut guard = self.sinks.write();
            let before = guard.len();
            guard.retain(|sink| !sink.is_closed());
            tracing::debug!(removed = before - guard.len(), "pruned closed status sinks");
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    pub fn clear(&self) {
        self.sinks.write().clear();
    }
}
