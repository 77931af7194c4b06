//! 统一错误模型
//!
//! 单主机的失败是数据（HostResult），不会以错误形式越过 Dispatcher；
//! 这里的错误类型只用于会中止整次执行的场景与进程退出码映射。

use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, FleetError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum FleetError {
    /// 输入无效，在接触任何主机之前检出，中止整次执行
    #[error("Configuration error: {0}")]
    Config(String),

    /// 单主机连接或认证失败（通常作为 HostResult 数据承载）
    #[error("Connection error: {0}")]
    Connection(String),

    /// 步骤超过截止时间
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 步骤退出码不在可接受集合内
    #[error("Operation failed: {0}")]
    Operation(String),

    /// 未处理的内部错误
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl FleetError {
    /// 映射到进程退出码（成功/部分失败由 RunSummary 决定，不经过这里）
    pub fn process_exit_code(&self) -> i32 {
        match self {
            FleetError::Config(_) => 2,
            FleetError::Connection(_) => 3,
            FleetError::Timeout(_) | FleetError::Operation(_) => 4,
            FleetError::Unexpected(_) => 5,
        }
    }

    // 便捷方法
    pub fn config(msg: impl Into<String>) -> Self {
        FleetError::Config(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        FleetError::Unexpected(msg.into())
    }
}
