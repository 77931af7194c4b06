//! SSH 传输实现
//!
//! 基于 russh 的 `Transport`/`RemoteSession` 适配

mod transport;

pub use transport::{HostKeyVerification, SshSettings, SshTransport};
