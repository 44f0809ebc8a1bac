//! 错误类型

use std::io;

use thiserror::Error;

/// 线路单元解析失败
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unit too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },
    #[error("packet id is not ascii decimal: {0:?}")]
    InvalidId(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("read config: {0}")]
    Io(#[from] io::Error),
    #[error("parse config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// 发送引擎错误
#[derive(Debug, Error)]
pub enum SenderError {
    #[error("transport i/o: {0}")]
    Io(#[from] io::Error),
    #[error("session is closed")]
    Closed,
    #[error("no peer address; call accept_peer first")]
    NoPeer,
    #[error("packet id space exhausted (max {max})")]
    IdSpaceExhausted { max: u64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
