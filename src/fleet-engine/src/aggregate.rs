//! 结果聚合
//!
//! 把无序到达的主机结果整理成确定性的 RunSummary：hosts 顺序永远等于
//! 请求顺序，与任务完成顺序无关。缺失的主机按取消处理。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use common::host::Host;
use common::result::{HostResult, HostStatus, OverallStatus, RunSummary, StatusCounts};

/// 按请求顺序聚合主机结果
pub struct ResultAggregator {
    run_id: Uuid,
    plan: String,
    started_at: DateTime<Utc>,
    order: Vec<Host>,
}

impl ResultAggregator {
    pub fn new(run_id: Uuid, plan: String, started_at: DateTime<Utc>, hosts: &[Host]) -> Self {
        Self {
            run_id,
            plan,
            started_at,
            order: hosts.to_vec(),
        }
    }

    /// 将到达顺序任意的结果整理为请求顺序的汇总
    pub fn summarize(self, results: Vec<HostResult>, finished_at: DateTime<Utc>) -> RunSummary {
        let mut by_address: HashMap<String, HostResult> = results
            .into_iter()
            .map(|r| (r.host.address.clone(), r))
            .collect();

        let mut hosts = Vec::with_capacity(self.order.len());
        let mut counts = StatusCounts::default();

        for host in self.order {
            let result = match by_address.remove(&host.address) {
                Some(result) => result,
                None => {
                    // 调度层没有产出这台主机的结果，按未开始的取消处理
                    warn!(host = %host, "No result reported for host");
                    HostResult::cancelled(host)
                }
            };
            counts.record(result.status);
            hosts.push(result);
        }

        let overall = counts.overall();
        RunSummary {
            run_id: self.run_id,
            plan: self.plan,
            started_at: self.started_at,
            finished_at,
            hosts,
            counts,
            overall,
        }
    }
}

/// 把汇总结论映射为进程退出码
///
/// 0 = 全部成功；1 = 部分失败；3 = 全部尝试的主机都是连接失败；
/// 4 = 全部尝试的主机失败（混合或操作类）。配置错误与意外错误
/// 在进程边界上分别映射为 2 与 5。
pub fn resolve_exit_code(summary: &RunSummary) -> i32 {
    match summary.overall {
        OverallStatus::Success => 0,
        OverallStatus::PartialFailure => 1,
        OverallStatus::TotalFailure => {
            let all_connection = summary
                .hosts
                .iter()
                .filter(|r| r.status.attempted())
                .all(|r| r.status == HostStatus::ConnectionError);
            if all_connection {
                3
            } else {
                4
            }
        }
    }
}
