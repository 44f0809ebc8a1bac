//! 会话配置（JSON）
//!
//! 所有字段都有默认值；命令行参数在加载后覆盖对应字段。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::net::emulator::LinkConfig;
use crate::proto::newreno::NewRenoConfig;
use crate::proto::sender::SenderConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NUM_PACKETS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSpec {
    /// 发送端监听端口
    pub port: u16,
    /// 每轮发送的数据单元数
    pub num_packets: u64,
    /// 传输轮数
    pub rounds: u32,
    pub congestion: NewRenoConfig,
    pub sender: SenderConfig,
    pub link: LinkConfig,
}

impl Default for SessionSpec {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            num_packets: DEFAULT_NUM_PACKETS,
            rounds: 1,
            congestion: NewRenoConfig::default(),
            sender: SenderConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

impl SessionSpec {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let spec: SessionSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::Invalid("rounds must be at least 1".into()));
        }
        self.congestion.validate()?;
        self.sender.validate()?;
        self.link.validate()?;
        Ok(())
    }
}
