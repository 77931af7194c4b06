//! 操作计划模型
//!
//! 一个计划是有序的远程命令步骤序列，在一次执行中对所有主机只读共享。
//! 引擎不解释命令语义，只根据退出码判断步骤成败。

use serde::{Deserialize, Serialize};

/// 计划中的一个步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStep {
    /// 步骤序号（计划内从 0 开始）
    pub index: usize,

    /// 人类可读的描述
    pub description: String,

    /// 要执行的完整命令文本
    pub command: String,

    /// 可接受的退出码集合（默认只接受 0）
    #[serde(default = "default_expected_codes")]
    pub expected_exit_codes: Vec<i32>,
}

fn default_expected_codes() -> Vec<i32> {
    vec![0]
}

impl OperationStep {
    pub fn new(index: usize, description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            command: command.into(),
            expected_exit_codes: default_expected_codes(),
        }
    }

    /// 判断退出码是否在可接受集合内
    pub fn accepts(&self, exit_code: i32) -> bool {
        self.expected_exit_codes.contains(&exit_code)
    }
}

/// 有序的操作计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPlan {
    /// 计划名称（如 "install"）
    pub name: String,

    /// 有序步骤
    pub steps: Vec<OperationStep>,
}

impl OperationPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// 追加一个步骤，序号自动分配
    pub fn step(mut self, description: impl Into<String>, command: impl Into<String>) -> Self {
        let index = self.steps.len();
        self.steps.push(OperationStep::new(index, description, command));
        self
    }

    /// 追加一个自定义可接受退出码的步骤
    pub fn step_expecting(
        mut self,
        description: impl Into<String>,
        command: impl Into<String>,
        expected_exit_codes: &[i32],
    ) -> Self {
        let index = self.steps.len();
        let mut step = OperationStep::new(index, description, command);
        step.expected_exit_codes = expected_exit_codes.to_vec();
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_accepts_default_zero_only() {
        let step = OperationStep::new(0, "check", "true");
        assert!(step.accepts(0));
        assert!(!step.accepts(1));
        assert!(!step.accepts(-1));
    }

    #[test]
    fn test_plan_builder_assigns_indices() {
        let plan = OperationPlan::new("install")
            .step("first", "echo 1")
            .step("second", "echo 2")
            .step("third", "echo 3");

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.steps[0].index, 0);
        assert_eq!(plan.steps[2].index, 2);
        assert_eq!(plan.steps[1].description, "second");
    }

    #[test]
    fn test_step_expecting_custom_codes() {
        let plan = OperationPlan::new("maintenance").step_expecting(
            "grep may find nothing",
            "grep -q pattern file",
            &[0, 1],
        );

        assert!(plan.steps[0].accepts(0));
        assert!(plan.steps[0].accepts(1));
        assert!(!plan.steps[0].accepts(2));
    }

    #[test]
    fn test_plan_serialization_round_trip() {
        let plan = OperationPlan::new("start").step("start service", "svc start");
        let json = serde_json::to_string(&plan).unwrap();
        let back: OperationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_expected_codes_default_on_deserialize() {
        let json = r#"{"index":0,"description":"d","command":"c"}"#;
        let step: OperationStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.expected_exit_codes, vec![0]);
    }
}
