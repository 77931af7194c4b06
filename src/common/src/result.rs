//! 执行结果模型
//!
//! 单步结果、单主机结果与整次执行汇总。所有类型可序列化，
//! 供机器可读的报告输出使用。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::Host;

/// 每路输出（stdout/stderr）保留的最大字节数
pub const MAX_CAPTURED_OUTPUT: usize = 16 * 1024;

/// 截断过长的捕获输出，保留 UTF-8 边界
pub fn truncate_output(raw: &str) -> String {
    if raw.len() <= MAX_CAPTURED_OUTPUT {
        return raw.to_string();
    }
    let mut end = MAX_CAPTURED_OUTPUT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &raw[..end])
}

/// 单个步骤的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// 退出码在可接受集合内
    Ok,
    /// 退出码不在可接受集合内
    Failed,
    /// 超过步骤截止时间
    TimedOut,
}

/// 单个步骤的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// 步骤序号
    pub index: usize,

    /// 退出码（超时按约定记为 124）
    pub exit_code: i32,

    /// 捕获的标准输出（截断后）
    pub stdout: String,

    /// 捕获的标准错误（截断后）
    pub stderr: String,

    /// 执行时长（秒）
    pub duration_secs: f64,

    /// 结果分类
    pub status: StepStatus,
}

impl StepResult {
    /// 从原始捕获构造结果，输出在此处统一截断
    pub fn new(
        index: usize,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
        duration_secs: f64,
        status: StepStatus,
    ) -> Self {
        Self {
            index,
            exit_code,
            stdout: truncate_output(stdout),
            stderr: truncate_output(stderr),
            duration_secs,
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StepStatus::Ok
    }
}

/// 单主机的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// 计划内所有步骤均通过
    Success,
    /// 某个步骤退出码不可接受
    Failure,
    /// 某个步骤超时
    TimedOut,
    /// 连接或认证失败，未执行任何步骤
    ConnectionError,
    /// 因失败策略被取消，未执行（或未执行完）计划
    Cancelled,
}

impl HostStatus {
    /// 是否属于会触发 fail-fast 的终态失败
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            HostStatus::Failure | HostStatus::TimedOut | HostStatus::ConnectionError
        )
    }

    /// 是否实际接触过该主机（取消的主机未被接触）
    pub fn attempted(&self) -> bool {
        !matches!(self, HostStatus::Cancelled)
    }
}

/// 单主机的执行结果
///
/// 不变量：steps 在第一个非 Ok 步骤处截止，之后的步骤不会出现在列表里
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResult {
    pub host: Host,
    pub status: HostStatus,

    /// 实际尝试过的步骤结果（按计划顺序）
    pub steps: Vec<StepResult>,

    /// 附加错误信息（连接错误等）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostResult {
    pub fn success(host: Host, steps: Vec<StepResult>) -> Self {
        Self {
            host,
            status: HostStatus::Success,
            steps,
            error: None,
        }
    }

    pub fn failure(host: Host, steps: Vec<StepResult>) -> Self {
        Self {
            host,
            status: HostStatus::Failure,
            steps,
            error: None,
        }
    }

    pub fn timed_out(host: Host, steps: Vec<StepResult>) -> Self {
        Self {
            host,
            status: HostStatus::TimedOut,
            steps,
            error: None,
        }
    }

    pub fn connection_error(host: Host, error: impl Into<String>) -> Self {
        Self {
            host,
            status: HostStatus::ConnectionError,
            steps: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// 未开始就被取消的主机
    pub fn cancelled(host: Host) -> Self {
        Self::cancelled_after(host, Vec::new())
    }

    /// 步骤间让位于取消信号的主机，保留已完成的步骤
    pub fn cancelled_after(host: Host, steps: Vec<StepResult>) -> Self {
        Self {
            host,
            status: HostStatus::Cancelled,
            steps,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == HostStatus::Success
    }
}

/// 整次执行的总体结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// 所有主机成功
    Success,
    /// 成功与失败混合（或全部被取消）
    PartialFailure,
    /// 至少接触过一台主机且无一成功
    TotalFailure,
}

/// 按状态统计的主机数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub success: usize,
    pub failure: usize,
    pub timed_out: usize,
    pub connection_error: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    /// 记录一个主机状态
    pub fn record(&mut self, status: HostStatus) {
        match status {
            HostStatus::Success => self.success += 1,
            HostStatus::Failure => self.failure += 1,
            HostStatus::TimedOut => self.timed_out += 1,
            HostStatus::ConnectionError => self.connection_error += 1,
            HostStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failure + self.timed_out + self.connection_error + self.cancelled
    }

    /// 实际接触过的主机数
    pub fn attempted(&self) -> usize {
        self.total() - self.cancelled
    }

    /// 推导总体结论：全部成功、部分失败，或全军覆没
    pub fn overall(&self) -> OverallStatus {
        if self.total() > 0 && self.success == self.total() {
            OverallStatus::Success
        } else if self.success == 0 && self.attempted() > 0 {
            OverallStatus::TotalFailure
        } else {
            OverallStatus::PartialFailure
        }
    }
}

/// 一次执行的确定性汇总报告
///
/// hosts 的顺序始终等于调用方给出的主机顺序，与完成顺序无关
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// 本次执行的标识
    pub run_id: Uuid,

    /// 计划名称
    pub plan: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// 按请求顺序排列的主机结果
    pub hosts: Vec<HostResult>,

    pub counts: StatusCounts,
    pub overall: OverallStatus,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.overall == OverallStatus::Success
    }
}
