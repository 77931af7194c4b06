//! 凭证管理
//!
//! 一次执行中所有会话共享同一份凭证。首个调用者触发获取（交互提示或
//! 预先提供的值），结果缓存；之后的并发或顺序调用者拿到同一份缓存值，
//! 不会再次触发获取。初始化由一次性屏障保护，初始化完成后只读。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::debug;

use common::error::{FleetError, Result};

/// 一次执行的共享凭证：公开的用户名 + 敏感的密钥
///
/// 密钥由 `SecretString` 包装：不会出现在 Debug 输出里，丢弃时清零
#[derive(Debug)]
pub struct Credential {
    pub username: String,
    secret: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: SecretString) -> Self {
        Self {
            username: username.into(),
            secret,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

/// 密钥来源：阻塞式获取，每次执行至多被调用一次
pub trait SecretSource: Send + Sync {
    fn acquire(&self, username: &str) -> Result<SecretString>;
}

/// 预先提供的密钥（配置值或测试用）
pub struct StaticSecret(SecretString);

impl StaticSecret {
    pub fn new(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl SecretSource for StaticSecret {
    fn acquire(&self, _username: &str) -> Result<SecretString> {
        Ok(self.0.clone())
    }
}

/// 凭证代理
///
/// `obtain()` 的初始化路径由 `OnceCell` 屏障保护：N 个调用者同时到达时
/// 只有一个执行获取，其余阻塞等待并观察到同一个值。`release()` 清除缓存，
/// 由 Dispatcher 在所有退出路径上调用一次。
pub struct CredentialBroker {
    username: String,
    source: Box<dyn SecretSource>,
    init: OnceCell<()>,
    slot: RwLock<Option<Arc<Credential>>>,
    acquisitions: AtomicUsize,
}

impl CredentialBroker {
    pub fn new(username: impl Into<String>, source: Box<dyn SecretSource>) -> Self {
        Self {
            username: username.into(),
            source,
            init: OnceCell::new(),
            slot: RwLock::new(None),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// 获取共享凭证；首个调用者触发一次获取，其余复用缓存值
    pub async fn obtain(&self) -> Result<Arc<Credential>> {
        self.init
            .get_or_try_init(|| async {
                self.acquisitions.fetch_add(1, Ordering::SeqCst);
                debug!(username = %self.username, "Acquiring run credential");
                let secret = self.source.acquire(&self.username)?;
                let mut slot = self
                    .slot
                    .write()
                    .map_err(|_| FleetError::unexpected("credential slot poisoned"))?;
                *slot = Some(Arc::new(Credential::new(self.username.clone(), secret)));
                Ok::<(), FleetError>(())
            })
            .await?;

        self.slot
            .read()
            .map_err(|_| FleetError::unexpected("credential slot poisoned"))?
            .clone()
            .ok_or_else(|| FleetError::unexpected("credential already released"))
    }

    /// 清除缓存的凭证；最后一个引用释放时密钥内存被清零
    pub fn release(&self) {
        if let Ok(mut slot) = self.slot.write() {
            if slot.take().is_some() {
                debug!("Run credential released");
            }
        }
    }

    /// 获取函数被实际调用的次数
    pub fn acquisition_count(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl SecretSource for CountingSource {
        fn acquire(&self, _username: &str) -> Result<SecretString> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            Ok(SecretString::new("hunter2".to_string()))
        }
    }

    fn broker_with_counter(delay: Duration) -> (Arc<CredentialBroker>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let broker = CredentialBroker::new(
            "deploy",
            Box::new(CountingSource {
                calls: calls.clone(),
                delay,
            }),
        );
        (Arc::new(broker), calls)
    }

    #[tokio::test]
    async fn test_single_caller_acquires_once() {
        let (broker, calls) = broker_with_counter(Duration::ZERO);
        let credential = broker.obtain().await.unwrap();
        assert_eq!(credential.username, "deploy");
        assert_eq!(credential.secret().expose_secret(), "hunter2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_callers_acquire_exactly_once() {
        for n in [1usize, 10, 100] {
            let (broker, calls) = broker_with_counter(Duration::from_millis(20));

            let tasks: Vec<_> = (0..n)
                .map(|_| {
                    let broker = broker.clone();
                    tokio::spawn(async move { broker.obtain().await.unwrap() })
                })
                .collect();

            let mut credentials = Vec::new();
            for task in tasks {
                credentials.push(task.await.unwrap());
            }

            assert_eq!(calls.load(Ordering::SeqCst), 1, "n = {n}");
            assert_eq!(broker.acquisition_count(), 1);
            // 所有调用者观察到同一个值
            for credential in &credentials {
                assert!(Arc::ptr_eq(credential, &credentials[0]));
            }
        }
    }

    #[tokio::test]
    async fn test_sequential_callers_share_cached_value() {
        let (broker, calls) = broker_with_counter(Duration::ZERO);
        let first = broker.obtain().await.unwrap();
        let second = broker.obtain().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_obtain_after_release_fails_without_reacquiring() {
        let (broker, calls) = broker_with_counter(Duration::ZERO);
        let _ = broker.obtain().await.unwrap();
        broker.release();

        let err = broker.obtain().await.unwrap_err();
        assert!(matches!(err, FleetError::Unexpected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (broker, _) = broker_with_counter(Duration::ZERO);
        let _ = broker.obtain().await.unwrap();
        broker.release();
        broker.release();
    }

    #[tokio::test]
    async fn test_source_error_is_propagated() {
        struct FailingSource;
        impl SecretSource for FailingSource {
            fn acquire(&self, _username: &str) -> Result<SecretString> {
                Err(FleetError::config("prompt aborted"))
            }
        }

        let broker = CredentialBroker::new("deploy", Box::new(FailingSource));
        assert!(broker.obtain().await.is_err());
    }
}
