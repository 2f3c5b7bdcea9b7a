//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLANSOLVE__*` 覆盖（双下划线表示嵌套，如 `PLANSOLVE__SOLVER__MAX_ROUNDS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub solver: SolverSection,
    pub router: RouterSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、沙箱根目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// file_agent 的沙箱根目录，未设置时用 ./workspace
    pub workspace_root: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "plansolve".to_string(),
            workspace_root: PathBuf::from("workspace"),
        }
    }
}

/// [llm] 段：OpenAI 兼容端点、模型、并发上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub request_timeout_secs: u64,
    /// 同时在途的推理调用上限（所有请求共享）
    pub max_concurrency: usize,
    /// [llm.vision]：multimodal_agent 使用的视觉模型，缺省时复用主模型
    pub vision: Option<VisionSection>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "qwen-plus".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: Some(0.0),
            request_timeout_secs: 60,
            max_concurrency: 4,
            vision: None,
        }
    }
}

impl LlmSection {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionSection {
    pub model: String,
    /// 缺省时沿用 [llm] 的 base_url / api_key_env
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

/// [solver] 段：规划循环
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverSection {
    pub max_rounds: usize,
    /// 执行计划步骤的能力名
    pub executor: String,
    /// executor 单步内最多工具调用次数
    pub executor_max_steps: usize,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            max_rounds: crate::solver::DEFAULT_MAX_ROUNDS,
            executor: "executor".to_string(),
            executor_max_steps: crate::tools::DEFAULT_EXECUTOR_MAX_STEPS,
        }
    }
}

/// [router] 段：意图路由
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// 单次请求内 路由 -> 调度 的最大跳数
    pub max_hops: usize,
    pub fast_match: bool,
    /// 关键词未命中时是否调用 LLM 分类
    pub llm_classify: bool,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            max_hops: 4,
            fast_match: true,
            llm_classify: true,
        }
    }
}

/// [tools] 段：单次调用超时与各能力参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次叶子能力调用超时（秒）
    pub tool_timeout_secs: u64,
    pub shell: ShellSection,
    pub http: HttpSection,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            shell: ShellSection::default(),
            http: HttpSection::default(),
            search: SearchSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub allowed_commands: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: ["ls", "grep", "cat", "head", "tail", "wc", "find", "echo", "date", "uname"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 20,
        }
    }
}

/// [tools.http] 段：为空的 allowed_domains 表示不限制
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_result_chars: 8000,
            allowed_domains: Vec::new(),
        }
    }
}

/// [tools.search] 段：结果页端点（查询词拼在末尾）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://www.baidu.com/s?wd=".to_string(),
            timeout_secs: 15,
            max_result_chars: 8000,
        }
    }
}

impl AppConfig {
    /// 校验取值范围
    pub fn validate(&self) -> Result<(), AgentError> {
        let checks = [
            (self.solver.max_rounds == 0, "solver.max_rounds must be at least 1"),
            (self.solver.executor_max_steps == 0, "solver.executor_max_steps must be at least 1"),
            (self.solver.executor.trim().is_empty(), "solver.executor must not be empty"),
            (self.router.max_hops == 0, "router.max_hops must be at least 1"),
            (self.llm.max_concurrency == 0, "llm.max_concurrency must be at least 1"),
            (self.llm.model.trim().is_empty(), "llm.model must not be empty"),
            (self.tools.tool_timeout_secs == 0, "tools.tool_timeout_secs must be at least 1"),
        ];
        match checks.iter().find(|(bad, _)| *bad) {
            Some((_, msg)) => Err(AgentError::Config(msg.to_string())),
            None => Ok(()),
        }
    }
}

/// 从 config 目录加载配置，环境变量 PLANSOLVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PLANSOLVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLANSOLVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.solver.max_rounds, 5);
        assert_eq!(cfg.router.max_hops, 4);
        assert_eq!(cfg.llm.max_concurrency, 4);
        assert_eq!(cfg.solver.executor, "executor");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[solver]\nmax_rounds = 2\n\n[tools.search]\nendpoint = \"https://example.com/?q=\"\n\n[llm.vision]\nmodel = \"qwen-vl\""
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.solver.max_rounds, 2);
        assert_eq!(cfg.solver.executor_max_steps, 6);
        assert_eq!(cfg.tools.search.endpoint, "https://example.com/?q=");
        assert_eq!(cfg.llm.vision.unwrap().model, "qwen-vl");
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let mut cfg = AppConfig::default();
        cfg.solver.max_rounds = 0;
        assert!(matches!(cfg.validate(), Err(AgentError::Config(_))));
    }
}
