//! russh 传输适配器
//!
//! 每台主机建立一条连接，整个计划的所有步骤复用该连接；
//! 步骤超时后连接状态不再可信，由上层关闭会话。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::credential::Credential;
use crate::session::{CommandOutput, RemoteSession, SessionError, Transport};
use common::host::Host;

/// 主机密钥验证策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// 严格模式：只接受已知的主机密钥
    Strict,
    /// 接受模式：首次连接时接受新密钥，之后验证
    #[default]
    Accept,
    /// 禁用验证（不安全，仅用于开发/测试）
    Disabled,
}

impl std::str::FromStr for HostKeyVerification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "accept" => Ok(Self::Accept),
            "disabled" | "none" | "false" => Ok(Self::Disabled),
            _ => Err(format!("Unknown host key verification mode: {}", s)),
        }
    }
}

/// SSH 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// 端口
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// 连接与握手超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 主机密钥验证策略
    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    /// 已知的主机密钥（host:port -> 指纹）
    #[serde(default)]
    pub known_hosts: Option<HashMap<String, String>>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }
}

/// 基于 russh 的传输实现
pub struct SshTransport {
    settings: SshSettings,
}

impl SshTransport {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn handler_for(&self, host: &Host) -> HostKeyHandler {
        HostKeyHandler {
            verification_mode: self.settings.host_key_verification.clone(),
            known_hosts: self.settings.known_hosts.clone(),
            host: host.address.clone(),
            port: self.settings.port,
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(
        &self,
        host: &Host,
        credential: &Credential,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let target = format!("{}@{}:{}", credential.username, host.address, self.settings.port);
        debug!(target = %target, "Opening SSH connection");

        let client_config = Arc::new(client::Config {
            preferred: russh::Preferred::default(),
            ..Default::default()
        });

        let mut handle = timeout(
            Duration::from_secs(self.settings.connect_timeout_secs),
            client::connect(
                client_config,
                (host.address.clone(), self.settings.port),
                self.handler_for(host),
            ),
        )
        .await
        .map_err(|_| SessionError::Connection(format!("connect timed out: {}", target)))?
        .map_err(|e| {
            error!(target = %target, error = %e, "SSH connection failed");
            SessionError::Connection(format!("{}: {}", target, e))
        })?;

        let authed = handle
            .authenticate_password(
                credential.username.clone(),
                credential.secret().expose_secret(),
            )
            .await
            .map_err(|e| SessionError::Connection(format!("{}: {}", target, e)))?;

        if !authed {
            warn!(target = %target, "SSH authentication rejected");
            return Err(SessionError::Authentication(target));
        }

        info!(target = %target, "SSH session established");
        Ok(Box::new(SshSession { handle, target }))
    }
}

/// 一条已认证的 SSH 会话，计划内的每个步骤打开一个新通道
struct SshSession {
    handle: client::Handle<HostKeyHandler>,
    target: String,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn run(&mut self, command: &str, deadline: Duration) -> Result<CommandOutput, SessionError> {
        let started = Instant::now();

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Execution(format!("channel open: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Execution(format!("exec: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0;

        loop {
            // 截止时间按整个步骤计算，而不是按单次消息等待
            let msg = if deadline.is_zero() {
                channel.wait().await
            } else {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    warn!(target = %self.target, "Command deadline elapsed");
                    let _ = channel.close().await;
                    return Err(SessionError::Timeout(deadline));
                }
                match timeout(remaining, channel.wait()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        warn!(target = %self.target, "Command deadline elapsed");
                        let _ = channel.close().await;
                        return Err(SessionError::Timeout(deadline));
                    }
                }
            };

            match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    stdout.extend_from_slice(data);
                }
                Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                    if ext == 1 {
                        // SSH_EXTENDED_DATA_STDERR
                        stderr.extend_from_slice(data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status as i32;
                    break;
                }
                Some(ChannelMsg::Eof) => {
                    break;
                }
                None => {
                    break;
                }
                _ => {}
            }
        }

        let _ = channel.close().await;
        let duration_secs = started.elapsed().as_secs_f64();

        debug!(
            target = %self.target,
            exit_code = exit_code,
            duration_secs = duration_secs,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command finished"
        );

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration_secs,
        })
    }

    async fn close(&mut self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;
        debug!(target = %self.target, "SSH session closed");
    }
}

/// 主机密钥验证处理器
struct HostKeyHandler {
    verification_mode: HostKeyVerification,
    known_hosts: Option<HashMap<String, String>>,
    host: String,
    port: u16,
}

impl HostKeyHandler {
    fn fingerprint(server_public_key: &PublicKey) -> String {
        let key_data = server_public_key.public_key_base64();
        let mut hasher = sha2::Sha256::new();
        hasher.update(key_data.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn stored_fingerprint(&self, host_key: &str) -> Option<&String> {
        self.known_hosts.as_ref().and_then(|known| known.get(host_key))
    }
}

#[async_trait]
impl client::Handler for HostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let host_key = format!("{}:{}", self.host, self.port);

        match self.verification_mode {
            HostKeyVerification::Disabled => {
                warn!(host = %host_key, "Host key verification DISABLED - accepting all keys");
                Ok(true)
            }
            HostKeyVerification::Accept => {
                let fingerprint = Self::fingerprint(server_public_key);
                match self.stored_fingerprint(&host_key) {
                    Some(stored) if stored == &fingerprint => {
                        debug!(host = %host_key, "Host key verified");
                        Ok(true)
                    }
                    Some(stored) => {
                        error!(
                            host = %host_key,
                            expected = %stored,
                            actual = %fingerprint,
                            "Host key mismatch - POSSIBLE SECURITY BREACH"
                        );
                        Ok(false)
                    }
                    None => {
                        info!(
                            host = %host_key,
                            fingerprint = %fingerprint,
                            "First time connecting - accepting host key"
                        );
                        Ok(true)
                    }
                }
            }
            HostKeyVerification::Strict => {
                let fingerprint = Self::fingerprint(server_public_key);
                match self.stored_fingerprint(&host_key) {
                    Some(stored) if stored == &fingerprint => {
                        debug!(host = %host_key, "Host key verified (strict mode)");
                        Ok(true)
                    }
                    Some(stored) => {
                        error!(
                            host = %host_key,
                            expected = %stored,
                            actual = %fingerprint,
                            "Host key mismatch - REJECTING CONNECTION"
                        );
                        Ok(false)
                    }
                    None => {
                        error!(host = %host_key, "Unknown host in strict mode - rejecting connection");
                        Ok(false)
                    }
                }
            }
        }
    }
}
