//! 执行参数

use di_impl::ProviderSet;
use runtime_common::{value, ContainerError, ContainerResult, Value};
use std::any::Any;
use std::collections::BTreeMap;

/// 单次执行的命名参数
///
/// 每次执行都会从参数构建新的提供者集合，同名参数覆盖根注入器中的插件
#[derive(Clone, Default)]
pub struct ExecutionArgs {
    values: BTreeMap<String, Value>,
}

impl ExecutionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加参数
    pub fn with<T>(mut self, name: impl Into<String>, inner: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(name, inner);
        self
    }

    /// 插入参数，返回被替换的旧值
    pub fn insert<T>(&mut self, name: impl Into<String>, inner: T) -> Option<Value>
    where
        T: Any + Send + Sync,
    {
        self.insert_value(name, value(inner))
    }

    /// 插入已包装的值
    pub fn insert_value(&mut self, name: impl Into<String>, inner: Value) -> Option<Value> {
        self.values.insert(name.into(), inner)
    }

    /// 从 JSON 对象构建，每个字段以 [`serde_json::Value`] 注入
    pub fn from_json(object: serde_json::Value) -> ContainerResult<Self> {
        match object {
            serde_json::Value::Object(fields) => Ok(fields.into_iter().collect()),
            other => Err(ContainerError::InvalidSettings {
                message: format!("执行参数必须是 JSON 对象: {}", other),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 转换为值提供者集合
    pub fn to_provider_set(&self) -> ProviderSet {
        self.values
            .iter()
            .map(|(name, inner)| (name.clone(), inner.clone()))
            .collect()
    }
}

impl<S, T> FromIterator<(S, T)> for ExecutionArgs
where
    S: Into<String>,
    T: Any + Send + Sync,
{
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, inner) in iter {
            args.insert(name, inner);
        }
        args
    }
}

impl std::fmt::Debug for ExecutionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionArgs")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
