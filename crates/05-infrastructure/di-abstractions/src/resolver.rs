//! 依赖解析器抽象接口
//!
//! 按名称解析依赖并调用可注入函数

use crate::injectable::Injectable;
use async_trait::async_trait;
use runtime_common::{DependencyError, InvokeError, Value};

/// 依赖解析器 trait
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// 按名称解析依赖
    async fn resolve(&self, name: &str) -> Result<Value, DependencyError>;

    /// 解析依赖列表并调用函数
    async fn invoke(&self, injectable: &Injectable) -> Result<Value, InvokeError>;

    /// 检查是否可以解析指定名称
    fn can_resolve(&self, name: &str) -> bool;
}

/// 解析上下文
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// 当前解析链，用于检测循环依赖
    pub resolution_chain: Vec<String>,
    /// 解析选项
    pub options: ResolveOptions,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            resolution_chain: Vec::new(),
            options,
        }
    }

    /// 添加名称到解析链
    pub fn push_name(&mut self, name: &str) -> Result<(), DependencyError> {
        if self.resolution_chain.iter().any(|entry| entry == name) {
            return Err(DependencyError::CircularDependency {
                dependency_chain: format!("{} -> {}", self.chain(), name),
            });
        }
        if self.resolution_chain.len() >= self.options.max_depth {
            return Err(DependencyError::MaxDepthExceeded {
                max_depth: self.options.max_depth,
                dependency_chain: self.chain(),
            });
        }
        self.resolution_chain.push(name.to_string());
        Ok(())
    }

    /// 从解析链中移除名称
    pub fn pop_name(&mut self) {
        self.resolution_chain.pop();
    }

    fn chain(&self) -> String {
        self.resolution_chain.join(" -> ")
    }
}

/// 解析选项
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// 最大递归深度
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}
