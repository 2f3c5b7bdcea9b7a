//! task_solver：把 Plan–Execute–Reflect 循环暴露为一个组合能力

use std::sync::Arc;

use async_trait::async_trait;

use crate::solver::LoopController;
use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

pub struct TaskSolverCapability {
    controller: Arc<LoopController>,
}

impl TaskSolverCapability {
    pub fn new(controller: Arc<LoopController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Capability for TaskSolverCapability {
    fn name(&self) -> &str {
        "task_solver"
    }

    fn description(&self) -> &str {
        "Solve multi-step or complex problems by planning, executing steps with tools and reflecting on results. Args: {\"query\": \"the objective\"}"
    }

    fn sub_capabilities(&self) -> Vec<String> {
        vec![self.controller.executor().to_string()]
    }

    async fn call(&self, dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let outcome = self.controller.run(dispatcher, &args.query).await;
        if outcome.is_ok() {
            Ok(outcome.output)
        } else {
            Err(outcome.output)
        }
    }
}
