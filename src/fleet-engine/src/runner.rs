//! 单主机执行器
//!
//! 对一台主机执行整份计划：连接一次，按顺序跑每个步骤，在首个
//! 失败/超时处截止，让位于取消信号。无论哪条路径退出都会关闭会话。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::credential::Credential;
use crate::session::{SessionError, Transport, TIMEOUT_EXIT_CODE};
use common::host::Host;
use common::plan::OperationPlan;
use common::result::{HostResult, StepResult, StepStatus};

/// 对单台主机执行计划的运行器
///
/// 运行器本身无状态，同一个实例可以被多台主机的任务共享
pub struct HostRunner {
    transport: Arc<dyn Transport>,
    plan: Arc<OperationPlan>,
    step_deadline: Duration,
}

impl HostRunner {
    pub fn new(transport: Arc<dyn Transport>, plan: Arc<OperationPlan>, step_deadline: Duration) -> Self {
        Self {
            transport,
            plan,
            step_deadline,
        }
    }

    /// 对一台主机执行整份计划
    ///
    /// 取消检查点：连接前与每个步骤开始前。命令一旦发出就执行到底，
    /// 之后在下一个检查点让位。
    pub async fn run(
        &self,
        host: Host,
        credential: Arc<Credential>,
        cancel: CancellationToken,
    ) -> HostResult {
        if cancel.is_cancelled() {
            return HostResult::cancelled(host);
        }

        let mut session = match self.transport.connect(&host, &credential).await {
            Ok(session) => session,
            Err(e) => {
                warn!(host = %host, error = %e, "Connection failed, skipping host");
                return HostResult::connection_error(host, e.to_string());
            }
        };

        let mut steps: Vec<StepResult> = Vec::with_capacity(self.plan.len());

        for step in &self.plan.steps {
            if cancel.is_cancelled() {
                info!(host = %host, step = step.index, "Cancelled before step");
                session.close().await;
                return HostResult::cancelled_after(host, steps);
            }

            info!(host = %host, step = step.index, description = %step.description, "Running step");

            match session.run(&step.command, self.step_deadline).await {
                Ok(output) => {
                    let accepted = step.accepts(output.exit_code);
                    let status = if accepted { StepStatus::Ok } else { StepStatus::Failed };
                    let result = StepResult::new(
                        step.index,
                        output.exit_code,
                        &output.stdout,
                        &output.stderr,
                        output.duration_secs,
                        status,
                    );
                    steps.push(result);

                    if !accepted {
                        warn!(
                            host = %host,
                            step = step.index,
                            exit_code = output.exit_code,
                            "Step failed, aborting remaining steps"
                        );
                        session.close().await;
                        return HostResult::failure(host, steps);
                    }
                }
                Err(SessionError::Timeout(deadline)) => {
                    warn!(
                        host = %host,
                        step = step.index,
                        deadline_secs = deadline.as_secs(),
                        "Step timed out, aborting remaining steps"
                    );
                    steps.push(StepResult::new(
                        step.index,
                        TIMEOUT_EXIT_CODE,
                        "",
                        "",
                        deadline.as_secs_f64(),
                        StepStatus::TimedOut,
                    ));
                    session.close().await;
                    return HostResult::timed_out(host, steps);
                }
                Err(e) => {
                    // 通道级故障：按失败步骤记录，退出码沿用 -1 约定
                    warn!(host = %host, step = step.index, error = %e, "Step execution error");
                    steps.push(StepResult::new(
                        step.index,
                        -1,
                        "",
                        &e.to_string(),
                        0.0,
                        StepStatus::Failed,
                    ));
                    session.close().await;
                    return HostResult::failure(host, steps);
                }
            }
        }

        info!(host = %host, steps = steps.len(), "All steps completed");
        session.close().await;
        HostResult::success(host, steps)
    }
}
