//! 密码来源
//!
//! CredentialBroker 保证这里的获取逻辑每次执行至多触发一次，
//! 交互提示因此不会重复弹出。密码全程包在 SecretString 里，不进日志。

use dialoguer::Password;
use secrecy::SecretString;
use tracing::debug;

use common::error::{FleetError, Result};
use fleet_engine::SecretSource;

/// 从环境变量读取密码
pub struct EnvSecret {
    var: String,
}

impl EnvSecret {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl SecretSource for EnvSecret {
    fn acquire(&self, _username: &str) -> Result<SecretString> {
        debug!(var = %self.var, "Reading password from environment");
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(SecretString::new(value)),
            Ok(_) => Err(FleetError::config(format!("environment variable {} is empty", self.var))),
            Err(_) => Err(FleetError::config(format!("environment variable {} is not set", self.var))),
        }
    }
}

/// 终端交互式密码提示
pub struct PromptSecret;

impl SecretSource for PromptSecret {
    fn acquire(&self, username: &str) -> Result<SecretString> {
        let value = Password::new()
            .with_prompt(format!("SSH password for {}", username))
            .interact()
            .map_err(|e| FleetError::config(format!("password prompt failed: {}", e)))?;

        if value.is_empty() {
            return Err(FleetError::config("password must not be empty"));
        }
        Ok(SecretString::new(value))
    }
}
