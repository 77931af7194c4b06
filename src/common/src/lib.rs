//! fleet-system 共享类型：主机、操作计划、执行结果与错误模型
//!
//! 被 fleet-engine（执行引擎）和 fleetctl（命令行）共享

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// 导出所有模块
pub mod error;
pub mod host;
pub mod plan;
pub mod result;

// 重新导出常用的类型
pub use error::{FleetError, Result as FleetResult};
pub use host::Host;
pub use plan::{OperationPlan, OperationStep};
pub use result::{
    HostResult, HostStatus, OverallStatus, RunSummary, StatusCounts, StepResult, StepStatus,
};
