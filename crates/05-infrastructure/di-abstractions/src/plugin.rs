//! 插件配置与启动上下文
//!
//! 插件配置描述启动时要装配的命名插件，由 [`PluginResolver`] 解析为
//! 扁平的 [`BootContext`]。

use crate::injectable::Injectable;
use async_trait::async_trait;
use futures::FutureExt;
use runtime_common::{value, BoxFuture, HookError, PluginError, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 插件销毁回调，接收插件实例
pub type Disposer = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// 插件规格
#[derive(Clone)]
pub enum PluginSpec {
    /// 静态值
    Value(Value),
    /// 可调用的工厂，原样进入启动上下文
    Factory(Injectable),
    /// 由解析器调用初始化函数创建的组件，可以依赖其他插件
    Component(ComponentSpec),
    /// 指向另一个插件的引用
    Reference(String),
}

impl PluginSpec {
    /// 创建静态值插件
    pub fn value<T>(inner: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::Value(value(inner))
    }

    /// 创建工厂插件
    pub fn factory(factory: Injectable) -> Self {
        Self::Factory(factory)
    }

    /// 创建组件插件
    pub fn component(create: Injectable) -> Self {
        Self::Component(ComponentSpec::new(create))
    }

    /// 创建引用插件
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Reference(target.into())
    }

    /// 规格种类，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Factory(_) => "factory",
            Self::Component(_) => "component",
            Self::Reference(_) => "reference",
        }
    }
}

impl From<ComponentSpec> for PluginSpec {
    fn from(spec: ComponentSpec) -> Self {
        Self::Component(spec)
    }
}

impl std::fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(<opaque>)"),
            Self::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            Self::Component(spec) => f.debug_tuple("Component").field(spec).finish(),
            Self::Reference(target) => f.debug_tuple("Reference").field(target).finish(),
        }
    }
}

/// 组件规格
#[derive(Clone)]
pub struct ComponentSpec {
    /// 初始化函数，依赖名称指向其他插件
    pub create: Injectable,
    /// 销毁回调
    pub destroy: Option<Disposer>,
}

impl ComponentSpec {
    /// 创建新的组件规格
    pub fn new(create: Injectable) -> Self {
        Self {
            create,
            destroy: None,
        }
    }

    /// 设置销毁回调
    pub fn with_destroy<F, Fut>(mut self, destroy: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.destroy = Some(Arc::new(move |instance| destroy(instance).boxed()));
        self
    }
}

impl std::fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("create", &self.create)
            .field("destroy", &self.destroy.as_ref().map(|_| "<function>"))
            .finish()
    }
}

/// 插件配置构建器
///
/// 在 `configure` 阶段之前和期间可变，随后冻结为 [`PluginConfig`]
#[derive(Debug, Clone, Default)]
pub struct PluginConfigBuilder {
    plugins: BTreeMap<String, PluginSpec>,
}

impl PluginConfigBuilder {
    /// 创建空构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加插件，同名插件会被替换
    pub fn add_plugin(&mut self, name: impl Into<String>, spec: PluginSpec) -> &mut Self {
        let name = name.into();
        debug!(plugin = %name, kind = spec.kind(), "添加插件");
        if self.plugins.insert(name.clone(), spec).is_some() {
            warn!(plugin = %name, "插件已存在，旧的规格被替换");
        }
        self
    }

    /// 移除插件
    pub fn remove_plugin(&mut self, name: &str) -> Option<PluginSpec> {
        self.plugins.remove(name)
    }

    /// 检查插件是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// 插件名称
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// 冻结为插件配置
    pub fn build(self) -> PluginConfig {
        PluginConfig {
            plugins: Arc::new(self.plugins),
        }
    }
}

/// 冻结后的插件配置
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    plugins: Arc<BTreeMap<String, PluginSpec>>,
}

impl PluginConfig {
    /// 获取插件规格
    pub fn get(&self, name: &str) -> Option<&PluginSpec> {
        self.plugins.get(name)
    }

    /// 插件名称，按字典序
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// 遍历插件
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginSpec)> {
        self.plugins.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// 启动上下文中的插件值
#[derive(Clone)]
pub enum PluginValue {
    /// 可调用的工厂
    Factory(Injectable),
    /// 具体实例
    Instance(Value),
}

impl PluginValue {
    /// 是否可调用
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// 作为普通值传递，工厂本身被包装成值
    pub fn into_value(self) -> Value {
        match self {
            Self::Factory(factory) => Arc::new(factory),
            Self::Instance(instance) => instance,
        }
    }
}

impl std::fmt::Debug for PluginValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            Self::Instance(_) => f.write_str("Instance(<opaque>)"),
        }
    }
}

struct DisposerEntry {
    plugin: String,
    instance: Value,
    disposer: Disposer,
}

/// 启动上下文
///
/// 插件名称到具体值的扁平映射，并持有销毁回调
#[derive(Default)]
pub struct BootContext {
    entries: HashMap<String, PluginValue>,
    disposers: Vec<DisposerEntry>,
}

impl BootContext {
    /// 创建空上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入插件值
    pub fn insert(&mut self, name: impl Into<String>, value: PluginValue) {
        self.entries.insert(name.into(), value);
    }

    /// 注册销毁回调，按注册的逆序执行
    pub fn register_disposer(&mut self, plugin: impl Into<String>, instance: Value, disposer: Disposer) {
        self.disposers.push(DisposerEntry {
            plugin: plugin.into(),
            instance,
            disposer,
        });
    }

    pub fn get(&self, name: &str) -> Option<&PluginValue> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 是否有待执行的销毁回调
    pub fn has_disposers(&self) -> bool {
        !self.disposers.is_empty()
    }

    /// 销毁上下文
    ///
    /// 所有回调都会执行，返回第一个失败
    pub async fn destroy(self) -> Result<(), PluginError> {
        let mut first_error = None;

        for entry in self.disposers.into_iter().rev() {
            debug!(plugin = %entry.plugin, "销毁插件");
            if let Err(source) = (entry.disposer)(entry.instance).await {
                error!(plugin = %entry.plugin, error = %source, "插件销毁失败");
                if first_error.is_none() {
                    first_error = Some(PluginError::DestroyFailed {
                        plugin: entry.plugin,
                        source,
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for BootContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootContext")
            .field("entries", &self.entries)
            .field("disposers", &self.disposers.len())
            .finish()
    }
}

/// 插件解析器 trait
///
/// 将插件配置解析为启动上下文，支持插件之间的依赖和异步初始化
#[async_trait]
pub trait PluginResolver: Send + Sync {
    /// 解析全部插件
    async fn resolve(&self, config: &PluginConfig) -> Result<BootContext, PluginError>;

    /// 解析器名称
    fn name(&self) -> &str;
}
