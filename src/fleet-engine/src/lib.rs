//! 多主机远程执行引擎
//!
//! 将（主机集合, 操作计划, 执行策略）变成一次确定性的、并发安全的、
//! 可部分失败的执行：凭证恰好获取一次，每台主机按计划顺序执行并在
//! 首个失败步骤处截止，结果按请求顺序聚合为 RunSummary。

pub mod aggregate;
pub mod credential;
pub mod dispatcher;
pub mod runner;
pub mod session;
pub mod ssh;

pub use aggregate::{resolve_exit_code, ResultAggregator};
pub use credential::{Credential, CredentialBroker, SecretSource, StaticSecret};
pub use dispatcher::{Dispatcher, ExecutionMode, ExecutionPolicy, FailurePolicy, DEFAULT_PARALLEL_CAP};
pub use runner::HostRunner;
pub use session::{CommandOutput, RemoteSession, SessionError, Transport, NO_DEADLINE, TIMEOUT_EXIT_CODE};
pub use ssh::{HostKeyVerification, SshSettings, SshTransport};
