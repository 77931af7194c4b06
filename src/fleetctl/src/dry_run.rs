//! dry-run 传输
//!
//! 不接触任何主机，为每个步骤伪造成功输出。用于在真正执行前
//! 检查计划内容与主机清单。

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use common::host::Host;
use fleet_engine::{CommandOutput, Credential, RemoteSession, SessionError, Transport};

/// 伪造成功结果的传输实现
pub struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    async fn connect(
        &self,
        host: &Host,
        credential: &Credential,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        info!(host = %host, username = %credential.username, "[dry-run] Would connect");
        Ok(Box::new(DryRunSession { host: host.clone() }))
    }
}

struct DryRunSession {
    host: Host,
}

#[async_trait]
impl RemoteSession for DryRunSession {
    async fn run(&mut self, command: &str, _deadline: Duration) -> Result<CommandOutput, SessionError> {
        info!(host = %self.host, command = %command, "[dry-run] Would execute");
        Ok(CommandOutput {
            exit_code: 0,
            stdout: format!("[dry-run] {}", command),
            stderr: String::new(),
            duration_secs: 0.0,
        })
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_dry_run_fabricates_success() {
        let credential = Credential::new("deploy", SecretString::new("unused".to_string()));
        let mut session = DryRunTransport
            .connect(&Host::new("web-01"), &credential)
            .await
            .unwrap();

        let output = session.run("rm -rf /srv/nginx_run", Duration::ZERO).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("rm -rf /srv/nginx_run"));
    }
}
