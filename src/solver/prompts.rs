//! 各角色的 system prompt 与 user 消息模板

use crate::structured::{action_format_instructions, plan_format_instructions, routing_format_instructions};

const PLANNER_PROMPT: &str = r#"You are a workflow planner inside a multi-agent execution system.

Turn the user's objective into the shortest sequence of tool-executable steps.

Rules:
1. Every step must be directly executable by one of the available tools listed below; name the tool in the step.
2. Never plan steps that mimic human browsing ("click", "navigate to", "read the page").
3. Delegate arithmetic to the math tool instead of computing it in your head.
4. Keep steps specific enough that an executor can call a tool with them without further planning.
5. Output only the JSON object, no explanations and no markdown fences."#;

const REFLECT_PROMPT: &str = r#"You are reviewing the progress of a multi-step task.

You receive the objective, the steps executed so far with their results, and the steps still planned.
Decide what happens next:
- If the executed steps already answer the objective, respond to the user with the final answer only (no preamble).
- Otherwise return a new plan containing ONLY the steps that still need to be done. Do not repeat steps that succeeded.
- A step whose status is "failed" did not produce a usable result: plan around the failure (different tool, different input) instead of repeating it verbatim.

Output only the JSON object, no explanations and no markdown fences."#;

const SUMMARY_PROMPT: &str = r#"The task below ran out of planning rounds before reaching a final answer.
Using only the execution history, write the best possible final answer to the objective.
Answer directly and concisely; if the history is insufficient, say what is known."#;

const EXECUTOR_PROMPT: &str = r#"You are a task execution agent. Execute ONLY the current step you are given.

Pick the most appropriate tool from the list below and call it. After each tool call you will receive an Observation.
When the step is done, output the answer as plain text (no JSON).

To call a tool, output a single JSON object with exactly the keys "tool_name" and "arguments", for example:
{"tool_name": "search_agent", "arguments": {"query": "tokio github repository"}}
Do not wrap the JSON in markdown."#;

pub const MASTER_PROMPT: &str = r#"You are a friendly assistant. The user is making small talk or greeting you.
Reply briefly and politely in the user's language. Do not ask follow-up questions."#;

pub const MULTIMODAL_PROMPT: &str = r#"You analyse attachments (images, audio, video, PDF or other files) referenced by the user.
Answer the user's question about the attached content directly and concisely."#;

const ROUTER_PROMPT: &str = r#"You are the task router of a multi-agent system. Classify the user's query and route it.

Intent labels and targets:
| intent | target | typical triggers |
|---|---|---|
| file_ops | file_agent | read file, write file, data.txt, save |
| math | math_agent | calculate, how much, equations, numbers |
| http_fetch | http_agent | visit URL, fetch page, API call, GET, POST |
| web_search | search_agent | search, look up information |
| code_exec | shell_agent | run script, bash, execute command |
| nlp_text | string_agent | extract URLs, find emails |
| sys_check | system_agent | system info, CPU, memory |
| time_query | time_agent | what time is it, convert timezone |
| fallback | master | greetings, small talk |
| multi_step | task_solver | multi-step or complex problems needing planning |
| multimedia | multimodal_agent | image, audio, video, PDF, attached file |

Rules:
1. Never ask the user clarifying questions; assume the most logical interpretation.
2. If unsure, choose multi_step.
3. meta.intent must be one of the labels above; meta.reason is a one-line justification.
4. Output exactly one JSON object, no markdown."#;

fn tools_section(tools: &[(String, String)]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = tools
        .iter()
        .map(|(name, desc)| format!("- {name}: {desc}"))
        .collect();
    format!("\n\nAvailable tools:\n{}", lines.join("\n"))
}

pub fn planner_system(tools: &[(String, String)]) -> String {
    format!(
        "{PLANNER_PROMPT}{}\n\n{}",
        tools_section(tools),
        plan_format_instructions()
    )
}

pub fn reflect_system(tools: &[(String, String)]) -> String {
    format!(
        "{REFLECT_PROMPT}{}\n\n{}",
        tools_section(tools),
        action_format_instructions()
    )
}

pub fn summary_system() -> &'static str {
    SUMMARY_PROMPT
}

pub fn executor_system(tools: &[(String, String)]) -> String {
    format!("{EXECUTOR_PROMPT}{}", tools_section(tools))
}

pub fn router_system() -> String {
    format!("{ROUTER_PROMPT}\n\n{}", routing_format_instructions())
}

pub fn plan_request(objective: &str) -> String {
    format!("Objective:\n{objective}")
}

pub fn reflect_request(objective: &str, history: &str, remaining: &[String]) -> String {
    let remaining = if remaining.is_empty() {
        "(none)".to_string()
    } else {
        remaining
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Objective:\n{objective}\n\nExecuted steps:\n{history}\n\nRemaining plan:\n{remaining}"
    )
}

pub fn summary_request(objective: &str, history: &str) -> String {
    format!("Objective:\n{objective}\n\nExecution history:\n{history}")
}

pub fn executor_request(step: &str, history: Option<&str>) -> String {
    match history {
        Some(h) if !h.trim().is_empty() => {
            format!("Current step:\n{step}\n\nPrevious results (context only):\n{h}")
        }
        _ => format!("Current step:\n{step}"),
    }
}
