//! 提供者注册表
//!
//! 将扁平的名称到值映射包装为提供者集合。可调用的条目成为工厂提供者，
//! 其他条目成为值提供者。

use di_abstractions::{BootContext, Injectable, PluginValue};
use runtime_common::{value, DependencyError, Value};
use std::any::Any;
use std::collections::{HashMap, HashSet};

/// 提供者
#[derive(Clone)]
pub enum Provider {
    /// 工厂提供者，解析时调用
    Factory(Injectable),
    /// 值提供者
    Value(Value),
}

/// 提供者种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Factory,
    Value,
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Factory(_) => ProviderKind::Factory,
            Self::Value(_) => ProviderKind::Value,
        }
    }
}

impl From<PluginValue> for Provider {
    fn from(entry: PluginValue) -> Self {
        match entry {
            PluginValue::Factory(factory) => Self::Factory(factory),
            PluginValue::Instance(instance) => Self::Value(instance),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            Self::Value(_) => f.write_str("Value(<opaque>)"),
        }
    }
}

/// 提供者集合
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<String, Provider>,
}

impl ProviderSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂提供者
    pub fn factory(&mut self, name: impl Into<String>, factory: Injectable) -> &mut Self {
        self.providers.insert(name.into(), Provider::Factory(factory));
        self
    }

    /// 注册值提供者
    pub fn value<T>(&mut self, name: impl Into<String>, inner: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.insert_value(name, value(inner))
    }

    /// 注册已包装的值
    pub fn insert_value(&mut self, name: impl Into<String>, inner: Value) -> &mut Self {
        self.providers.insert(name.into(), Provider::Value(inner));
        self
    }

    /// 插入提供者，返回被替换的旧提供者
    pub fn insert(&mut self, name: impl Into<String>, provider: Provider) -> Option<Provider> {
        self.providers.insert(name.into(), provider)
    }

    /// 合并另一个集合，同名时后者覆盖前者
    pub fn extend(&mut self, other: ProviderSet) {
        self.providers.extend(other.providers);
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ProviderKind> {
        self.providers.get(name).map(Provider::kind)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 检测工厂提供者之间的循环依赖
    pub fn detect_cycles(&self) -> Result<(), DependencyError> {
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();

        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();

        for name in names {
            self.dfs_check(name, &mut visited, &mut visiting)?;
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        current: &str,
        visited: &mut HashSet<String>,
        visiting: &mut Vec<String>,
    ) -> Result<(), DependencyError> {
        if let Some(start) = visiting.iter().position(|name| name == current) {
            let mut chain = visiting[start..].to_vec();
            chain.push(current.to_string());
            return Err(DependencyError::CircularDependency {
                dependency_chain: chain.join(" -> "),
            });
        }

        if visited.contains(current) {
            return Ok(());
        }

        if let Some(Provider::Factory(factory)) = self.providers.get(current) {
            visiting.push(current.to_string());
            for dependency in factory.dependency_list().iter() {
                self.dfs_check(dependency, visited, visiting)?;
            }
            visiting.pop();
        }

        visited.insert(current.to_string());
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for ProviderSet {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            providers: iter
                .into_iter()
                .map(|(name, inner)| (name.into(), Provider::Value(inner)))
                .collect(),
        }
    }
}

/// 提供者注册表
///
/// 纯函数，对任何输入都确定且不会失败
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// 按条目构建提供者集合
    pub fn build<I, S>(entries: I) -> ProviderSet
    where
        I: IntoIterator<Item = (S, PluginValue)>,
        S: Into<String>,
    {
        ProviderSet {
            providers: entries
                .into_iter()
                .map(|(name, entry)| (name.into(), Provider::from(entry)))
                .collect(),
        }
    }

    /// 由启动上下文构建根提供者集合
    pub fn from_boot_context(context: &BootContext) -> ProviderSet {
        Self::build(context.iter().map(|(name, entry)| (name, entry.clone())))
    }
}
