//! 能力注册表
//!
//! 所有能力实现 Capability trait（name / description / sub_capabilities / call），
//! 由 CapabilityRegistryBuilder 收集后一次性构建。构建时校验：名称不重复、声明的下级能力都已注册、
//! 依赖关系无环。构建完成后注册表只读，以引用注入 Dispatcher。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::structured::CapabilityArgs;
use crate::tools::Dispatcher;

/// 能力 trait：名称、描述（供 LLM 选择）、下级能力、异步调用
#[async_trait]
pub trait Capability: Send + Sync {
    /// 能力名称（对应路由记录中的 tool_name）
    fn name(&self) -> &str;

    /// 能力描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 本能力会经 Dispatcher 调用的下级能力名；非空即为组合能力，不受单次调用超时约束
    fn sub_capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// 执行；dispatcher 供组合能力调用下级能力
    async fn call(&self, dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String>;
}

/// 构建器：按注册顺序收集能力
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl CapabilityRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self, capability: impl Capability + 'static) -> Self {
        self.register_arc(Arc::new(capability))
    }

    pub fn register_arc(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// 校验并构建注册表
    pub fn build(self) -> Result<CapabilityRegistry, AgentError> {
        let mut capabilities: HashMap<String, Arc<dyn Capability>> = HashMap::new();
        for cap in self.capabilities {
            let name = cap.name().to_string();
            if capabilities.insert(name.clone(), cap).is_some() {
                return Err(AgentError::DuplicateCapability(name));
            }
        }

        // BTreeMap 保证遍历顺序稳定，报错信息可复现
        let graph: BTreeMap<String, Vec<String>> = capabilities
            .iter()
            .map(|(name, cap)| (name.clone(), cap.sub_capabilities()))
            .collect();

        for (name, deps) in &graph {
            if let Some(missing) = deps.iter().find(|d| !graph.contains_key(*d)) {
                return Err(AgentError::UnknownDependency {
                    capability: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        if let Some(cycle) = find_cycle(&graph) {
            return Err(AgentError::RegistryCycle(cycle.join(" -> ")));
        }

        Ok(CapabilityRegistry { capabilities })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// 深度优先三色标记找环；返回环上的节点序列（首尾相同）
fn find_cycle(graph: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    fn visit(
        node: &str,
        graph: &BTreeMap<String, Vec<String>>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(node.to_string(), Mark::Visiting);
        path.push(node.to_string());
        for dep in graph.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(dep, graph, marks, path) {
                return Some(cycle);
            }
        }
        path.pop();
        marks.insert(node.to_string(), Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    graph
        .keys()
        .find_map(|node| visit(node, graph, &mut marks, &mut path))
}

/// 只读注册表：按名称查找能力
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// 按名称排序的能力名列表
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let desc = self.capabilities.get(&name)?.description().to_string();
                Some((name, desc))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        subs: Vec<&'static str>,
    }

    #[async_trait]
    impl Capability for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test capability"
        }

        fn sub_capabilities(&self) -> Vec<String> {
            self.subs.iter().map(|s| s.to_string()).collect()
        }

        async fn call(&self, _d: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
            Ok(args.query)
        }
    }

    fn cap(name: &'static str, subs: &[&'static str]) -> Named {
        Named {
            name,
            subs: subs.to_vec(),
        }
    }

    #[test]
    fn test_build_acyclic_registry() {
        let registry = CapabilityRegistry::builder()
            .register(cap("task_solver", &["executor"]))
            .register(cap("executor", &["math_agent", "time_agent"]))
            .register(cap("math_agent", &[]))
            .register(cap("time_agent", &[]))
            .build()
            .unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.names()[0], "executor");
        assert!(registry.contains("math_agent"));
    }

    #[test]
    fn test_detects_cycle() {
        let err = CapabilityRegistry::builder()
            .register(cap("a", &["b"]))
            .register(cap("b", &["c"]))
            .register(cap("c", &["a"]))
            .build()
            .err()
            .unwrap();
        match err {
            AgentError::RegistryCycle(path) => assert_eq!(path, "a -> b -> c -> a"),
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_detects_self_reference() {
        let err = CapabilityRegistry::builder()
            .register(cap("loop", &["loop"]))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::RegistryCycle(_)));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = CapabilityRegistry::builder()
            .register(cap("executor", &["ghost"]))
            .build()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AgentError::UnknownDependency { ref dependency, .. } if dependency == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let err = CapabilityRegistry::builder()
            .register(cap("x", &[]))
            .register(cap("x", &[]))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::DuplicateCapability(_)));
    }
}
