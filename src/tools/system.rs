//! 系统信息能力：操作系统、架构、CPU 并行度、工作目录

use async_trait::async_trait;
use serde::Serialize;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

#[derive(Debug, Serialize)]
pub struct SystemReport {
    pub os: &'static str,
    pub family: &'static str,
    pub arch: &'static str,
    pub cpu_parallelism: usize,
    pub working_dir: String,
    pub pid: u32,
}

impl SystemReport {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            arch: std::env::consts::ARCH,
            cpu_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            working_dir: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            pid: std::process::id(),
        }
    }
}

pub struct SystemTool;

impl SystemTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for SystemTool {
    fn name(&self) -> &str {
        "system_agent"
    }

    fn description(&self) -> &str {
        "Report system information: OS, architecture, CPU parallelism, working directory. Args: {\"query\": \"...\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, _args: CapabilityArgs) -> Result<String, String> {
        serde_json::to_string_pretty(&SystemReport::collect()).map_err(|e| e.to_string())
    }
}
