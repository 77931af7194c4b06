//! 执行调度器
//!
//! 把（主机集合, 计划, 策略）展开为一次执行：校验输入，获取共享凭证，
//! 按串行或受限并行调度每台主机，应用失败策略，最终按请求顺序汇总。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::aggregate::ResultAggregator;
use crate::credential::CredentialBroker;
use crate::runner::HostRunner;
use crate::session::Transport;
use common::error::{FleetError, Result};
use common::host::Host;
use common::plan::OperationPlan;
use common::result::{HostResult, RunSummary};

/// 并行模式下默认的并发上限
pub const DEFAULT_PARALLEL_CAP: usize = 10;

/// 主机间的调度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// 按请求顺序逐台执行
    Serial,
    /// 受并发上限约束的并行执行
    Parallel,
}

/// 首个终态失败后的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 首个失败后取消尚未开始的主机
    FailFast,
    /// 所有主机都被尝试（默认）
    #[default]
    ContinueOnError,
}

/// 一次执行的完整策略
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    pub mode: ExecutionMode,

    /// 并行上限；None 表示取 min(主机数, DEFAULT_PARALLEL_CAP)
    pub max_concurrency: Option<usize>,

    pub failure_policy: FailurePolicy,

    /// 单步截止时间；零表示不设上限
    pub step_deadline: Duration,
}

impl ExecutionPolicy {
    pub fn serial() -> Self {
        Self {
            mode: ExecutionMode::Serial,
            max_concurrency: None,
            failure_policy: FailurePolicy::default(),
            step_deadline: Duration::ZERO,
        }
    }

    pub fn parallel(max_concurrency: Option<usize>) -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            max_concurrency,
            failure_policy: FailurePolicy::default(),
            step_deadline: Duration::ZERO,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_step_deadline(mut self, step_deadline: Duration) -> Self {
        self.step_deadline = step_deadline;
        self
    }

    /// 实际生效的并发度
    fn effective_concurrency(&self, host_count: usize) -> usize {
        match self.mode {
            ExecutionMode::Serial => 1,
            ExecutionMode::Parallel => self
                .max_concurrency
                .unwrap_or(DEFAULT_PARALLEL_CAP)
                .clamp(1, host_count.max(1)),
        }
    }
}

/// 凭证释放守卫：无论执行如何退出都归还凭证
struct ReleaseGuard<'a>(&'a CredentialBroker);

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// 执行调度器
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    broker: Arc<CredentialBroker>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, broker: Arc<CredentialBroker>) -> Self {
        Self { transport, broker }
    }

    /// 执行一次完整的多主机操作
    pub async fn execute(
        &self,
        hosts: Vec<Host>,
        plan: OperationPlan,
        policy: ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        if hosts.is_empty() {
            return Err(FleetError::config("host list is empty"));
        }
        if plan.is_empty() {
            return Err(FleetError::config(format!("plan '{}' has no steps", plan.name)));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            plan = %plan.name,
            hosts = hosts.len(),
            mode = ?policy.mode,
            failure_policy = ?policy.failure_policy,
            "Starting run"
        );

        let credential = self.broker.obtain().await?;
        let _guard = ReleaseGuard(&self.broker);

        let plan = Arc::new(plan);
        let runner = Arc::new(HostRunner::new(
            self.transport.clone(),
            plan.clone(),
            policy.step_deadline,
        ));

        let results = match policy.mode {
            ExecutionMode::Serial => {
                self.run_serial(&hosts, runner, credential, &policy, cancel).await
            }
            ExecutionMode::Parallel => {
                self.run_parallel(&hosts, runner, credential, &policy, cancel)
                    .await?
            }
        };

        let summary = ResultAggregator::new(run_id, plan.name.clone(), started_at, &hosts)
            .summarize(results, Utc::now());

        info!(
            run_id = %run_id,
            overall = ?summary.overall,
            success = summary.counts.success,
            failed = summary.counts.total() - summary.counts.success - summary.counts.cancelled,
            cancelled = summary.counts.cancelled,
            "Run finished"
        );

        Ok(summary)
    }

    async fn run_serial(
        &self,
        hosts: &[Host],
        runner: Arc<HostRunner>,
        credential: Arc<crate::credential::Credential>,
        policy: &ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Vec<HostResult> {
        let mut results = Vec::with_capacity(hosts.len());

        for host in hosts {
            if cancel.is_cancelled() {
                results.push(HostResult::cancelled(host.clone()));
                continue;
            }

            let result = runner.run(host.clone(), credential.clone(), cancel.clone()).await;

            if result.status.is_terminal_failure()
                && policy.failure_policy == FailurePolicy::FailFast
            {
                warn!(host = %result.host, status = ?result.status, "Fail-fast triggered");
                cancel.cancel();
            }

            results.push(result);
        }

        results
    }

    async fn run_parallel(
        &self,
        hosts: &[Host],
        runner: Arc<HostRunner>,
        credential: Arc<crate::credential::Credential>,
        policy: &ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Result<Vec<HostResult>> {
        let concurrency = policy.effective_concurrency(hosts.len());
        info!(concurrency = concurrency, "Dispatching hosts in parallel");

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let fail_fast = policy.failure_policy == FailurePolicy::FailFast;

        let handles: Vec<_> = hosts
            .iter()
            .cloned()
            .map(|host| {
                let runner = runner.clone();
                let credential = credential.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    // 排队期间收到取消信号的主机不再启动
                    let permit = tokio::select! {
                        _ = cancel.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    };

                    let Some(_permit) = permit else {
                        return HostResult::cancelled(host);
                    };

                    let result = runner.run(host, credential, cancel.clone()).await;

                    if result.status.is_terminal_failure() && fail_fast {
                        warn!(host = %result.host, status = ?result.status, "Fail-fast triggered");
                        cancel.cancel();
                    }

                    result
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(error = %e, "Host task panicked");
                    return Err(FleetError::unexpected(format!("host task failed: {}", e)));
                }
            }
        }

        Ok(results)
    }
}
