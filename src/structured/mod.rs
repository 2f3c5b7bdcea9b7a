//! 结构化输出：从推理引擎的自由文本中提取记录，并解码为 Plan / Action / RoutingDecision
//!
//! 规划、反思、路由与步骤执行器共用同一条 extract -> decode 流水线。

pub mod extract;
pub mod schema;

pub use extract::extract_record;
pub use schema::{
    action_format_instructions, decode_action, decode_plan, decode_routing, parse_action,
    parse_plan, parse_routing, plan_format_instructions, routing_format_instructions, Action,
    CapabilityArgs, Plan, RouteMeta, RoutingDecision,
};
