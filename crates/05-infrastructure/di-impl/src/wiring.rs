//! 插件装配器
//!
//! [`PluginResolver`] 的默认实现。按名称递归装配插件：静态值原样保留，
//! 工厂保持可调用，组件在其依赖装配完成后异步初始化，引用指向另一个插件的结果。

use async_trait::async_trait;
use di_abstractions::{
    BootContext, ComponentSpec, Dependencies, PluginConfig, PluginResolver, PluginSpec,
    PluginValue,
};
use futures::FutureExt;
use runtime_common::{BoxFuture, PluginError};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// 插件装配器
#[derive(Debug, Default, Clone, Copy)]
pub struct WiringResolver;

impl WiringResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginResolver for WiringResolver {
    async fn resolve(&self, config: &PluginConfig) -> Result<BootContext, PluginError> {
        info!(plugins = config.len(), "开始装配插件");

        let mut wiring = Wiring {
            config,
            context: BootContext::new(),
            wired: HashMap::new(),
        };

        for name in config.names() {
            let mut chain = Vec::new();
            if let Err(err) = wiring.wire(name, &mut chain).await {
                wiring.release().await;
                return Err(err);
            }
        }

        info!(plugins = wiring.context.len(), "插件装配完成");
        Ok(std::mem::take(&mut wiring.context))
    }

    fn name(&self) -> &str {
        "WiringResolver"
    }
}

/// 单次装配过程的状态
struct Wiring<'c> {
    config: &'c PluginConfig,
    context: BootContext,
    wired: HashMap<String, PluginValue>,
}

impl<'c> Wiring<'c> {
    /// 装配失败时释放已初始化的组件
    async fn release(&mut self) {
        let context = std::mem::take(&mut self.context);
        if !context.has_disposers() {
            return;
        }

        debug!(plugins = context.len(), "装配失败，释放已初始化的组件");
        if let Err(e) = context.destroy().await {
            warn!("释放已初始化的组件失败: {}", e);
        }
    }

    fn wire<'a>(
        &'a mut self,
        name: &'a str,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<PluginValue, PluginError>> {
        async move {
            if let Some(done) = self.wired.get(name) {
                return Ok(done.clone());
            }

            let config = self.config;
            let spec = config
                .get(name)
                .ok_or_else(|| PluginError::UnknownReference {
                    plugin: chain.last().cloned().unwrap_or_else(|| name.to_string()),
                    reference: name.to_string(),
                })?;

            if chain.iter().any(|entry| entry == name) {
                return Err(PluginError::CircularReference {
                    dependency_chain: format!("{} -> {}", chain.join(" -> "), name),
                });
            }

            chain.push(name.to_string());
            let wired = match spec {
                PluginSpec::Value(instance) => PluginValue::Instance(instance.clone()),
                PluginSpec::Factory(factory) => PluginValue::Factory(factory.clone()),
                PluginSpec::Reference(target) => self.wire(target, chain).await?,
                PluginSpec::Component(component) => {
                    self.create_component(name, component, chain).await?
                }
            };
            chain.pop();

            debug!(plugin = name, kind = spec.kind(), "插件已装配");
            self.wired.insert(name.to_string(), wired.clone());
            self.context.insert(name, wired.clone());
            Ok(wired)
        }
        .boxed()
    }

    async fn create_component(
        &mut self,
        name: &str,
        component: &ComponentSpec,
        chain: &mut Vec<String>,
    ) -> Result<PluginValue, PluginError> {
        let names = component.create.dependency_list();
        let mut values = Vec::with_capacity(names.len());
        for dependency in names.iter() {
            let wired = self.wire(dependency, chain).await?;
            values.push(wired.into_value());
        }

        debug!(plugin = name, dependencies = ?names, "初始化组件");
        let instance = component
            .create
            .call(Dependencies::new(&names, values))
            .await
            .map_err(|source| PluginError::InitializationFailed {
                plugin: name.to_string(),
                source,
            })?;

        if let Some(destroy) = &component.destroy {
            self.context
                .register_disposer(name, instance.clone(), destroy.clone());
        }

        Ok(PluginValue::Instance(instance))
    }
}

/// 装配被中途取消时，在后台释放已初始化的组件
impl Drop for Wiring<'_> {
    fn drop(&mut self) {
        if !self.context.has_disposers() {
            return;
        }

        let context = std::mem::take(&mut self.context);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(plugins = context.len(), "装配被取消，后台释放已初始化的组件");
                handle.spawn(async move {
                    if let Err(e) = context.destroy().await {
                        warn!("释放已初始化的组件失败: {}", e);
                    }
                });
            }
            Err(_) => warn!("装配被取消且不在运行时内，已初始化的组件无法释放"),
        }
    }
}
