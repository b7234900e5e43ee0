//! 生命周期程序构建器

use async_trait::async_trait;
use di_abstractions::{Injectable, LifecycleProgram, PluginConfigBuilder};
use runtime_common::{BoxFuture, HookError};
use std::sync::Arc;

type ConfigureFn =
    Arc<dyn Fn(&mut PluginConfigBuilder) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// 生命周期程序
///
/// 只有 main 是必需的，其余钩子默认为空操作。
/// 是否设置了前置/后置条件决定 `has_preconditions` / `has_postconditions`。
#[derive(Clone)]
pub struct Program {
    name: String,
    configure: Option<ConfigureFn>,
    setup: Injectable,
    teardown: Injectable,
    preconditions: Option<Injectable>,
    main: Injectable,
    postconditions: Option<Injectable>,
}

impl Program {
    /// 以 main 钩子创建程序
    pub fn new(name: impl Into<String>, main: Injectable) -> Self {
        Self {
            name: name.into(),
            configure: None,
            setup: Injectable::noop("setup"),
            teardown: Injectable::noop("teardown"),
            preconditions: None,
            main,
            postconditions: None,
        }
    }

    /// 设置配置钩子
    ///
    /// 钩子同步修改插件配置，返回的 future 在插件解析前等待完成
    pub fn with_configure<F, Fut>(mut self, configure: F) -> Self
    where
        F: Fn(&mut PluginConfigBuilder) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HookError>> + Send + 'static,
    {
        let configure: ConfigureFn = Arc::new(
            move |plugins: &mut PluginConfigBuilder| -> BoxFuture<'static, Result<(), HookError>> {
                Box::pin(configure(plugins))
            },
        );
        self.configure = Some(configure);
        self
    }

    pub fn with_setup(mut self, setup: Injectable) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_teardown(mut self, teardown: Injectable) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn with_preconditions(mut self, preconditions: Injectable) -> Self {
        self.preconditions = Some(preconditions);
        self
    }

    pub fn with_postconditions(mut self, postconditions: Injectable) -> Self {
        self.postconditions = Some(postconditions);
        self
    }
}

#[async_trait]
impl LifecycleProgram for Program {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self, plugins: &mut PluginConfigBuilder) -> Result<(), HookError> {
        match &self.configure {
            Some(configure) => configure(plugins).await,
            None => Ok(()),
        }
    }

    fn setup(&self) -> Injectable {
        self.setup.clone()
    }

    fn teardown(&self) -> Injectable {
        self.teardown.clone()
    }

    fn preconditions(&self) -> Injectable {
        self.preconditions
            .clone()
            .unwrap_or_else(|| Injectable::noop("preconditions"))
    }

    fn main(&self) -> Injectable {
        self.main.clone()
    }

    fn postconditions(&self) -> Injectable {
        self.postconditions
            .clone()
            .unwrap_or_else(|| Injectable::noop("postconditions"))
    }

    fn has_preconditions(&self) -> bool {
        self.preconditions.is_some()
    }

    fn has_postconditions(&self) -> bool {
        self.postconditions.is_some()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("main", &self.main)
            .field("has_preconditions", &self.has_preconditions())
            .field("has_postconditions", &self.has_postconditions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::PluginSpec;

    #[test]
    fn test_optional_phases_drive_predicates() {
        let program = Program::new("demo", Injectable::noop("main"));
        assert!(!program.has_preconditions());
        assert!(!program.has_postconditions());

        let program = program
            .with_preconditions(Injectable::noop("check"))
            .with_postconditions(Injectable::noop("verify"));
        assert!(program.has_preconditions());
        assert!(program.has_postconditions());
        assert_eq!(program.preconditions().name(), "check");
    }

    #[tokio::test]
    async fn test_configure_adds_plugins() {
        let program = Program::new("demo", Injectable::noop("main")).with_configure(|plugins| {
            plugins.add_plugin("port", PluginSpec::value(8080u16));
            async { Ok(()) }
        });

        let mut plugins = PluginConfigBuilder::new();
        program.configure(&mut plugins).await.unwrap();
        assert!(plugins.contains("port"));
    }
}
