//! 远程会话抽象
//!
//! 引擎对传输层的全部要求：建立到一台主机的认证连接，在截止时间内
//! 执行单条命令并捕获最终输出。引擎不依赖任何具体传输实现。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::Credential;
use common::host::Host;

/// 截止时间哨兵值：零表示不设等待上限
pub const NO_DEADLINE: Duration = Duration::ZERO;

/// 超时的约定退出码
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 单条命令的最终输出
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_secs: f64,
}

/// 会话层错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 命令超过截止时间；连接状态不再可信，调用方必须关闭会话
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution failed: {0}")]
    Execution(String),
}

impl SessionError {
    /// 是否属于连接/认证类失败（对应主机状态 connection_error）
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SessionError::Connection(_) | SessionError::Authentication(_))
    }
}

/// 到一台主机的已认证会话
///
/// 没有增量输出流的契约：输出在命令退出或截止时间触发后一次性取得
#[async_trait]
pub trait RemoteSession: Send {
    /// 执行单条命令。`deadline` 为零时无限等待；
    /// 超过非零截止时间返回 `SessionError::Timeout`
    async fn run(&mut self, command: &str, deadline: Duration) -> Result<CommandOutput, SessionError>;

    /// 关闭会话；在每条退出路径上都会被调用
    async fn close(&mut self);
}

/// 传输层工厂：为一台主机建立已认证会话
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        host: &Host,
        credential: &Credential,
    ) -> Result<Box<dyn RemoteSession>, SessionError>;
}
