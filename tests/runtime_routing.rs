//! 运行时路由集成测试：路由 -> 调度 -> 带观察结果再路由

use std::sync::Arc;

use plansolve::config::AppConfig;
use plansolve::core::Status;
use plansolve::llm::ScriptedLlmClient;
use plansolve::Runtime;

fn runtime(llm: Arc<ScriptedLlmClient>, llm_classify: bool) -> (Runtime, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_root = dir.path().to_path_buf();
    cfg.router.llm_classify = llm_classify;
    (Runtime::with_llm(&cfg, llm, None).unwrap(), dir)
}

#[tokio::test]
async fn test_direct_handler_answer_is_returned_verbatim() {
    let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
    let (rt, _dir) = runtime(llm.clone(), true);

    let outcome = rt.handle("计算 (3+4)*2", &[]).await;
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(outcome.output, "14");
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_routing_record_observation_takes_another_hop() {
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"tool_name": "math_agent", "arguments": {"query": "3*7"}}"#,
    ]));
    let (rt, _dir) = runtime(llm.clone(), false);

    // 问候走 master，master 的回复本身是路由记录，再转给 math_agent
    let outcome = rt.handle("你好", &[]).await;
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(outcome.output, "21");
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_hop_limit_reports_last_target() {
    let llm = Arc::new(
        ScriptedLlmClient::new(Vec::<String>::new())
            .with_fallback(r#"{"tool_name": "master", "arguments": {"query": "again"}}"#),
    );
    let (rt, _dir) = runtime(llm.clone(), false);

    let outcome = rt.handle("hello", &[]).await;
    assert_eq!(outcome.status, Status::Failed);
    assert!(outcome.output.contains("hop limit (4)"));
    assert!(outcome.output.contains("last target: master"));
    assert_eq!(llm.call_count(), 4);
}

#[tokio::test]
async fn test_failed_dispatch_ends_request() {
    let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
    let (rt, _dir) = runtime(llm, false);

    let outcome = rt.handle("运行 rm -rf /", &[]).await;
    assert_eq!(outcome.status, Status::Failed);
    assert!(outcome.output.contains("shell_agent"));
    assert!(outcome.render().starts_with("{\"status\":\"failed\""));
}

#[tokio::test]
async fn test_attachments_reach_multimodal_handler() {
    let llm = Arc::new(ScriptedLlmClient::new(["一只猫"]));
    let (rt, _dir) = runtime(llm.clone(), false);

    let outcome = rt.handle("这张图片里有什么", &["photo.jpg".to_string()]).await;
    assert_eq!(outcome.output, "一只猫");
    assert!(llm.prompt(0).unwrap().contains("Attachments:\nphoto.jpg"));
}

#[tokio::test]
async fn test_unmatched_request_runs_task_solver() {
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"steps": ["list the services"]}"#,
        "payments, loans, wealth management",
        r#"{"action": {"response": "It offers payments, loans and wealth management."}}"#,
    ]));
    let (rt, _dir) = runtime(llm.clone(), false);

    let outcome = rt.handle("京东金融提供了哪些服务？", &[]).await;
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(outcome.output, "It offers payments, loans and wealth management.");
    assert!(llm.prompt(0).unwrap().contains("京东金融提供了哪些服务？"));
}

#[test]
fn test_capabilities_are_listed() {
    let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
    let (rt, _dir) = runtime(llm, false);
    let names: Vec<String> = rt.capabilities().into_iter().map(|(n, _)| n).collect();
    for expected in [
        "math_agent",
        "time_agent",
        "string_agent",
        "file_agent",
        "shell_agent",
        "http_agent",
        "search_agent",
        "system_agent",
        "master",
        "multimodal_agent",
        "executor",
        "task_solver",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}
