//! 命令 ID 生成器

use perseus_net::CommandId;
use std::sync::atomic::{AtomicU32, Ordering};

/// 单调递增的命令 ID 生成器
///
/// 同一个机器人的所有控制器共享一个生成器（`Arc<CommandIdGenerator>`），
/// 以保证 ID 在整个会话内唯一。`u32` 溢出后回绕，并跳过保留值 `0`。
#[derive(Debug, Default)]
pub struct CommandIdGenerator {
    counter: AtomicU32,
}

impl CommandIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从指定值开始计数（下一次 `next` 返回 `start + 1`）
    pub fn starting_at(start: u32) -> Self {
        Self {
            counter: AtomicU32::new(start),
        }
    }

    /// 分配下一个 ID
    pub fn next(&self) -> CommandId {
        loop {
            // fetch_add 在 u32 上回绕
            let id = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return CommandId(id);
            }
        }
    }

    /// 最近一次分配的 ID
    pub fn last(&self) -> CommandId {
        CommandId(self.counter.load(Ordering::Relaxed))
    }
}
