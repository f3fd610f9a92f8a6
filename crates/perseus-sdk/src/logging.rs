//! 日志初始化
//!
//! 库内部只通过 `tracing` 宏输出日志，是否安装订阅者由应用决定。
//! 这里提供默认配置：`fmt` 输出 + `RUST_LOG` 过滤，
//! 并通过 `tracing-log` 把 `log` crate 的记录转发到 `tracing`。
//!
//! # 示例
//!
//! ```rust
//! // RUST_LOG 未设置时使用 info 级别
//! perseus_sdk::init_logging();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, ParseError};

/// 默认过滤指令
pub const DEFAULT_DIRECTIVE: &str = "info";

/// 使用默认指令初始化日志
///
/// 返回 `false` 表示全局订阅者已经存在（重复调用是安全的）。
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_DIRECTIVE).unwrap_or(false)
}

/// 使用指定的默认指令初始化日志
///
/// `RUST_LOG` 中的指令与 `default_directive` 叠加。
///
/// # 错误
/// - 指令语法错误时返回 `ParseError`，不安装订阅者
pub fn init_logging_with(default_directive: &str) -> Result<bool, ParseError> {
    let directive: Directive = default_directive.parse()?;
    let filter = EnvFilter::from_default_env().add_directive(directive);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return Ok(false);
    }
    // log 记录转发到 tracing；已有 logger 时保持不变
    let _ = tracing_log::LogTracer::init();
    Ok(true)
}
