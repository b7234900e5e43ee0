//! 注入器
//!
//! 注入器是一棵树上的节点：根注入器在启动时构建并一直存活，
//! 每次执行创建独立的子注入器。名称解析先查本节点，再按继承名单回退到父节点。

use crate::registry::{Provider, ProviderSet};
use async_trait::async_trait;
use dashmap::DashMap;
use di_abstractions::{
    Dependencies, DependencyResolver, Injectable, ResolveContext, ResolveOptions,
};
use futures::FutureExt;
use runtime_common::{BoxFuture, DependencyError, InvokeError, Scope, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

struct InjectorInner {
    scope: Scope,
    providers: ProviderSet,
    parent: Option<Injector>,
    /// 可以从父节点继承的名称，根节点为 None
    inherited: Option<HashSet<String>>,
    /// 工厂结果缓存，只有根节点启用
    instances: Option<DashMap<String, Arc<OnceCell<Value>>>>,
    options: ResolveOptions,
}

/// 注入器
///
/// 克隆开销很小，克隆体指向同一个节点
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// 创建根注入器
    ///
    /// 工厂之间存在循环依赖时返回错误
    pub fn new(providers: ProviderSet) -> Result<Self, DependencyError> {
        Self::with_options(providers, ResolveOptions::default())
    }

    /// 使用指定解析选项创建根注入器
    ///
    /// 根节点的工厂缓存跨任务共享初始化锁，循环依赖必须在构建时拒绝
    pub fn with_options(
        providers: ProviderSet,
        options: ResolveOptions,
    ) -> Result<Self, DependencyError> {
        providers.detect_cycles()?;

        let scope = Scope::root();
        debug!(scope = %scope.id, providers = providers.len(), "创建根注入器");

        Ok(Self {
            inner: Arc::new(InjectorInner {
                scope,
                providers,
                parent: None,
                inherited: None,
                instances: Some(DashMap::new()),
                options,
            }),
        })
    }

    /// 创建子注入器
    ///
    /// 自身提供者为 `extra` 的并集，后面的集合覆盖前面的。
    /// 只有 `inherited_names` 中的名称会回退到当前注入器解析。
    pub fn create_child<E, N, S>(&self, extra: E, inherited_names: N) -> Injector
    where
        E: IntoIterator<Item = ProviderSet>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_named_child("child", extra, inherited_names)
    }

    /// 创建带作用域名称的子注入器
    pub fn create_named_child<E, N, S>(
        &self,
        scope_name: &str,
        extra: E,
        inherited_names: N,
    ) -> Injector
    where
        E: IntoIterator<Item = ProviderSet>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut providers = ProviderSet::new();
        for set in extra {
            providers.extend(set);
        }

        let scope = self.inner.scope.child(scope_name);
        trace!(scope = %scope.name, id = %scope.id, providers = providers.len(), "创建子注入器");

        Injector {
            inner: Arc::new(InjectorInner {
                scope,
                providers,
                parent: Some(self.clone()),
                inherited: Some(inherited_names.into_iter().map(Into::into).collect()),
                instances: None,
                options: self.inner.options.clone(),
            }),
        }
    }

    /// 注入器作用域
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// 父注入器
    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// 本节点的提供者
    pub fn providers(&self) -> &ProviderSet {
        &self.inner.providers
    }

    /// 检查是否可以解析指定名称
    pub fn can_resolve(&self, name: &str) -> bool {
        if self.inner.providers.contains(name) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) if self.inherits(name) => parent.can_resolve(name),
            _ => false,
        }
    }

    /// 按名称解析
    pub async fn resolve(&self, name: &str) -> Result<Value, DependencyError> {
        self.resolve_with(name, self.new_context()).await
    }

    /// 解析依赖列表并调用函数
    ///
    /// 函数自身的失败原样传播
    pub async fn invoke(&self, injectable: &Injectable) -> Result<Value, InvokeError> {
        let names = injectable.dependency_list();
        trace!(scope = %self.inner.scope.name, hook = injectable.name(), dependencies = ?names, "注入调用");

        let dependencies = self.resolve_all(&names, self.new_context()).await?;
        injectable.call(dependencies).await.map_err(InvokeError::Hook)
    }

    /// 已缓存的工厂实例数量
    pub fn cached_instances(&self) -> usize {
        self.inner
            .instances
            .as_ref()
            .map(|instances| instances.iter().filter(|cell| cell.initialized()).count())
            .unwrap_or(0)
    }

    fn new_context(&self) -> ResolveContext {
        ResolveContext::new(self.inner.options.clone())
    }

    fn inherits(&self, name: &str) -> bool {
        match &self.inner.inherited {
            Some(names) => names.contains(name),
            None => true,
        }
    }

    fn resolve_with<'a>(
        &'a self,
        name: &'a str,
        ctx: ResolveContext,
    ) -> BoxFuture<'a, Result<Value, DependencyError>> {
        async move {
            if let Some(provider) = self.inner.providers.get(name) {
                return match provider {
                    Provider::Value(value) => Ok(value.clone()),
                    Provider::Factory(factory) => self.instantiate(name, factory, ctx).await,
                };
            }

            match &self.inner.parent {
                Some(parent) if self.inherits(name) => parent.resolve_with(name, ctx).await,
                _ => Err(DependencyError::unresolved(name)),
            }
        }
        .boxed()
    }

    async fn instantiate(
        &self,
        name: &str,
        factory: &Injectable,
        mut ctx: ResolveContext,
    ) -> Result<Value, DependencyError> {
        ctx.push_name(name)?;

        let Some(instances) = &self.inner.instances else {
            return self.run_factory(name, factory, ctx).await;
        };

        let cell = Arc::clone(&instances.entry(name.to_string()).or_default());
        cell.get_or_try_init(|| self.run_factory(name, factory, ctx))
            .await
            .cloned()
    }

    async fn run_factory(
        &self,
        name: &str,
        factory: &Injectable,
        ctx: ResolveContext,
    ) -> Result<Value, DependencyError> {
        debug!(scope = %self.inner.scope.name, provider = name, "调用工厂提供者");

        let names = factory.dependency_list();
        let dependencies = self.resolve_all(&names, ctx).await?;

        factory
            .call(dependencies)
            .await
            .map_err(|source| DependencyError::FactoryFailed {
                name: name.to_string(),
                source,
            })
    }

    async fn resolve_all(
        &self,
        names: &[String],
        ctx: ResolveContext,
    ) -> Result<Dependencies, DependencyError> {
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push(self.resolve_with(name, ctx.clone()).await?);
        }
        Ok(Dependencies::new(names, values))
    }
}

#[async_trait]
impl DependencyResolver for Injector {
    async fn resolve(&self, name: &str) -> Result<Value, DependencyError> {
        Injector::resolve(self, name).await
    }

    async fn invoke(&self, injectable: &Injectable) -> Result<Value, InvokeError> {
        Injector::invoke(self, injectable).await
    }

    fn can_resolve(&self, name: &str) -> bool {
        Injector::can_resolve(self, name)
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("scope", &self.inner.scope.name)
            .field("providers", &self.inner.providers.len())
            .field("parent", &self.inner.parent.as_ref().map(|p| p.scope().name.clone()))
            .finish()
    }
}
