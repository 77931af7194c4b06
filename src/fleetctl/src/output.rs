//! 结果渲染
//!
//! 文本形式面向终端阅读，JSON 形式面向机器消费（与 RunSummary
//! 的 serde 表示一致）。

use std::fmt::Write as _;

use common::error::{FleetError, Result};
use common::result::{HostStatus, OverallStatus, RunSummary};

use crate::cli::OutputFormat;

/// 渲染执行汇总
pub fn render(summary: &RunSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(summary)
            .map_err(|e| FleetError::unexpected(format!("cannot serialize summary: {}", e))),
        OutputFormat::Text => Ok(render_text(summary)),
    }
}

fn status_label(status: HostStatus) -> &'static str {
    match status {
        HostStatus::Success => "ok",
        HostStatus::Failure => "failed",
        HostStatus::TimedOut => "timed out",
        HostStatus::ConnectionError => "unreachable",
        HostStatus::Cancelled => "cancelled",
    }
}

fn overall_label(overall: OverallStatus) -> &'static str {
    match overall {
        OverallStatus::Success => "success",
        OverallStatus::PartialFailure => "partial failure",
        OverallStatus::TotalFailure => "total failure",
    }
}

fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Run {} ({})", summary.run_id, summary.plan);
    let _ = writeln!(out);

    let width = summary
        .hosts
        .iter()
        .map(|r| r.host.name.len())
        .max()
        .unwrap_or(0);

    for result in &summary.hosts {
        let _ = write!(
            out,
            "  {:<width$}  {:<12}",
            result.host.name,
            status_label(result.status),
        );

        match result.status {
            HostStatus::ConnectionError => {
                let _ = write!(out, "  {}", result.error.as_deref().unwrap_or("unknown error"));
            }
            HostStatus::Cancelled if !result.steps.is_empty() => {
                let _ = write!(out, "  after step {}", result.steps.len());
            }
            HostStatus::Failure | HostStatus::TimedOut => {
                if let Some(step) = result.steps.last() {
                    let _ = write!(out, "  step {} exit {}", step.index + 1, step.exit_code);
                    let detail = step.stderr.lines().next().unwrap_or("");
                    if !detail.is_empty() {
                        let _ = write!(out, ": {}", detail);
                    }
                }
            }
            _ => {}
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} of {} hosts succeeded ({} failed, {} unreachable, {} timed out, {} cancelled) - {}",
        summary.counts.success,
        summary.counts.total(),
        summary.counts.failure,
        summary.counts.connection_error,
        summary.counts.timed_out,
        summary.counts.cancelled,
        overall_label(summary.overall),
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use common::result::{HostResult, StatusCounts, StepResult, StepStatus};
    use common::Host;

    fn sample_summary() -> RunSummary {
        let hosts = vec![
            HostResult::success(
                Host::new("web-01"),
                vec![StepResult::new(0, 0, "ok", "", 0.2, StepStatus::Ok)],
            ),
            HostResult::failure(
                Host::new("web-02"),
                vec![StepResult::new(0, 1, "", "nginx: config test failed", 0.1, StepStatus::Failed)],
            ),
            HostResult::connection_error(Host::new("web-03"), "connection refused"),
        ];
        let mut counts = StatusCounts::default();
        for result in &hosts {
            counts.record(result.status);
        }
        let overall = counts.overall();
        RunSummary {
            run_id: Uuid::new_v4(),
            plan: "restart".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            hosts,
            counts,
            overall,
        }
    }

    #[test]
    fn test_text_output_lists_hosts_in_order() {
        let text = render(&sample_summary(), OutputFormat::Text).unwrap();
        let web01 = text.find("web-01").unwrap();
        let web02 = text.find("web-02").unwrap();
        let web03 = text.find("web-03").unwrap();
        assert!(web01 < web02 && web02 < web03);

        assert!(text.contains("step 1 exit 1: nginx: config test failed"));
        assert!(text.contains("unreachable"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("1 of 3 hosts succeeded"));
        assert!(text.contains("partial failure"));
    }

    #[test]
    fn test_json_output_round_trips() {
        let summary = sample_summary();
        let json = render(&summary, OutputFormat::Json).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plan, "restart");
        assert_eq!(back.hosts.len(), 3);
        assert_eq!(back.overall, OverallStatus::PartialFailure);
    }
}
