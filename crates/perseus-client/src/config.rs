//! 控制器配置
//!
//! 配置文件为 TOML 格式，所有字段都有默认值：
//!
//! ```toml
//! [controller]
//! cancel_on_stop = true
//! timeout_margin_ms = 0
//!
//! [[controller.modes]]
//! space = "Joint"
//! type = "Position"
//!
//! [[controller.modes]]
//! space = "Task"
//! type = "Command"
//! ```
//!
//! 配置文件路径由调用方决定。

use crate::error::ControlError;
use perseus_protocol::ControllerMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 配置文件顶层结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    controller: ControllerConfig,
}

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 停止时是否向服务端发送取消请求
    pub cancel_on_stop: bool,
    /// 每一步超时的额外余量（毫秒），用于抵消网络延迟
    pub timeout_margin_ms: u64,
    /// 为每种模式创建一个控制器
    pub modes: Vec<ControllerMode>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cancel_on_stop: true,
            timeout_margin_ms: 0,
            modes: vec![ControllerMode::joint_position(), ControllerMode::task_command()],
        }
    }
}

impl ControllerConfig {
    /// 从 TOML 字符串解析
    ///
    /// # 错误
    /// - `ControlError::Config`: 语法错误、字段类型错误或模式列表无效
    pub fn from_toml_str(content: &str) -> Result<Self, ControlError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| ControlError::Config(format!("invalid controller config: {e}")))?;
        file.controller.validated()
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ControlError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), modes = config.modes.len(), "controller config loaded");
        Ok(config)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ControlError> {
        toml::to_string(&ConfigFile {
            controller: self.clone(),
        })
        .map_err(|e| ControlError::Config(e.to_string()))
    }

    fn validated(self) -> Result<Self, ControlError> {
        if self.modes.is_empty() {
            return Err(ControlError::Config("at least one controller mode is required".into()));
        }
        if let Some(mode) = self.modes.iter().find(|m| !m.is_known()) {
            return Err(ControlError::Config(format!("unsupported controller mode {mode}")));
        }
        for (i, mode) in self.modes.iter().enumerate() {
            if self.modes[..i].contains(mode) {
                return Err(ControlError::Config(format!("duplicate controller mode {mode}")));
            }
        }
        Ok(self)
    }
}
