//! 生命周期容器
//!
//! 启动时配置并装配插件，构建根注入器并调用 setup；
//! 每次执行在根注入器下创建独立的子注入器，依次运行前置条件、main 与后置条件。

use crate::arguments::ExecutionArgs;
use crate::settings::ContainerSettings;
use di_abstractions::{
    BootContext, DeclaredParameters, Injectable, LifecycleProgram, ParameterAnnotator,
    PluginConfigBuilder, PluginResolver, PluginSpec, ResolveOptions, OUTCOME,
};
use di_impl::{Injector, ProviderRegistry, WiringResolver};
use parking_lot::Mutex;
use runtime_common::{
    ContainerError, ContainerResult, DependencyError, HookError, LifecycleState, Value,
    BOOT_TIMEOUT_MESSAGE,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// 已附加依赖列表的钩子
///
/// 五个钩子都会注解，可选阶段是否调用由谓词决定
#[derive(Clone)]
struct Hooks {
    setup: Injectable,
    teardown: Injectable,
    preconditions: Injectable,
    main: Injectable,
    postconditions: Injectable,
    has_preconditions: bool,
    has_postconditions: bool,
}

impl Hooks {
    fn annotate(program: &dyn LifecycleProgram, annotator: &dyn ParameterAnnotator) -> Self {
        let attach = |hook: Injectable| {
            hook.annotate(annotator);
            hook
        };

        Self {
            setup: attach(program.setup()),
            teardown: attach(program.teardown()),
            preconditions: attach(program.preconditions()),
            main: attach(program.main()),
            postconditions: attach(program.postconditions()),
            has_preconditions: program.has_preconditions(),
            has_postconditions: program.has_postconditions(),
        }
    }

    fn preconditions(&self) -> Option<&Injectable> {
        self.has_preconditions.then_some(&self.preconditions)
    }

    fn postconditions(&self) -> Option<&Injectable> {
        self.has_postconditions.then_some(&self.postconditions)
    }
}

/// 启动后持有的运行时资源
struct BootedRuntime {
    context: BootContext,
    root: Injector,
    hooks: Hooks,
    plugin_names: Arc<[String]>,
}

impl BootedRuntime {
    fn venue(&self) -> Venue {
        Venue {
            root: self.root.clone(),
            hooks: self.hooks.clone(),
            plugin_names: Arc::clone(&self.plugin_names),
        }
    }
}

/// 单次执行所需的根注入器快照，不持有状态锁
struct Venue {
    root: Injector,
    hooks: Hooks,
    plugin_names: Arc<[String]>,
}

#[derive(Default)]
enum ContainerState {
    #[default]
    Uninitialized,
    Booted(BootedRuntime),
    Faulted(BootedRuntime),
}

impl ContainerState {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            Self::Uninitialized => LifecycleState::Uninitialized,
            Self::Booted(_) => LifecycleState::Booted,
            Self::Faulted(_) => LifecycleState::Faulted,
        }
    }
}

/// 生命周期容器
pub struct Container {
    program: Arc<dyn LifecycleProgram>,
    resolver: Arc<dyn PluginResolver>,
    annotator: Arc<dyn ParameterAnnotator>,
    settings: ContainerSettings,
    plugins: Mutex<PluginConfigBuilder>,
    state: RwLock<ContainerState>,
}

impl Container {
    /// 使用默认装配器和注解器创建容器
    pub fn new<P>(program: P) -> Self
    where
        P: LifecycleProgram + 'static,
    {
        Self {
            program: Arc::new(program),
            resolver: Arc::new(WiringResolver::new()),
            annotator: Arc::new(DeclaredParameters),
            settings: ContainerSettings::default(),
            plugins: Mutex::new(PluginConfigBuilder::new()),
            state: RwLock::new(ContainerState::Uninitialized),
        }
    }

    /// 设置插件装配器
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: PluginResolver + 'static,
    {
        self.resolver = Arc::new(resolver);
        self
    }

    /// 设置参数注解器
    pub fn with_annotator<A>(mut self, annotator: A) -> Self
    where
        A: ParameterAnnotator + 'static,
    {
        self.annotator = Arc::new(annotator);
        self
    }

    /// 设置容器配置
    pub fn with_settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// 添加插件
    ///
    /// 只能在启动前调用。与 `init` 或 `destroy` 同时进行时返回 [`ContainerError::Busy`]
    pub fn add_plugin(&self, name: impl Into<String>, spec: PluginSpec) -> ContainerResult<()> {
        let state = self.state.try_read().map_err(|_| ContainerError::Busy)?;
        if !matches!(*state, ContainerState::Uninitialized) {
            return Err(ContainerError::AlreadyInitialized);
        }

        self.plugins.lock().add_plugin(name, spec);
        Ok(())
    }

    /// 使用配置中的超时启动容器
    pub async fn init_with_settings(&self) -> ContainerResult<Value> {
        self.settings.validate()?;
        self.init(self.settings.boot_timeout_ms).await
    }

    /// 启动容器
    ///
    /// 返回 setup 钩子的结果
    pub async fn init(&self, timeout_ms: u64) -> ContainerResult<Value> {
        let mut state = self.state.write().await;
        if !state.lifecycle().can_init() {
            return Err(ContainerError::AlreadyInitialized);
        }

        info!(program = self.program.name(), "开始启动容器");

        let mut plugins = self.plugins.lock().clone();
        self.program
            .configure(&mut plugins)
            .await
            .map_err(|source| {
                error!(program = self.program.name(), "configure 钩子失败: {}", source);
                ContainerError::ConfigureFailed { source }
            })?;
        let config = plugins.build();

        debug!(
            resolver = self.resolver.name(),
            plugins = config.len(),
            timeout_ms,
            "开始解析插件"
        );
        let resolution = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.resolver.resolve(&config),
        )
        .await;

        let context = match resolution {
            Ok(Ok(context)) => context,
            Ok(Err(source)) => {
                error!("插件解析失败: {}", source);
                return Err(ContainerError::BootFailure { source });
            }
            Err(_) => {
                error!(timeout_ms, "{}", BOOT_TIMEOUT_MESSAGE);
                return Err(ContainerError::BootTimeout {
                    timeout_ms,
                    message: BOOT_TIMEOUT_MESSAGE.to_string(),
                });
            }
        };

        let root = match Injector::with_options(
            ProviderRegistry::from_boot_context(&context),
            ResolveOptions {
                max_depth: self.settings.max_resolution_depth,
            },
        ) {
            Ok(root) => root,
            Err(cycle) => {
                error!("插件工厂存在循环依赖: {}", cycle);
                if let Err(e) = context.destroy().await {
                    warn!("释放启动上下文失败: {}", e);
                }
                return Err(cycle.into());
            }
        };
        let hooks = Hooks::annotate(self.program.as_ref(), self.annotator.as_ref());
        let plugin_names: Arc<[String]> = config.names().map(String::from).collect();

        if self.settings.validate_dependencies {
            check_hooks(&root, &hooks, &plugin_names);
        }

        let setup = root.invoke(&hooks.setup).await;
        let runtime = BootedRuntime {
            context,
            root,
            hooks,
            plugin_names,
        };

        match setup {
            Ok(result) => {
                *state = ContainerState::Booted(runtime);
                info!(program = self.program.name(), "容器启动完成");
                Ok(result)
            }
            Err(source) => {
                error!(program = self.program.name(), "setup 钩子失败: {}", source);
                *state = ContainerState::Faulted(runtime);
                Err(ContainerError::SetupFailed { source })
            }
        }
    }

    /// 执行一次生命周期
    ///
    /// 返回 main 的结果。后置条件失败时结果不会返回
    pub async fn execute(&self, args: ExecutionArgs) -> ContainerResult<Value> {
        let Venue {
            root,
            hooks,
            plugin_names,
        } = {
            let state = self.state.read().await;
            match &*state {
                ContainerState::Booted(runtime) => runtime.venue(),
                ContainerState::Faulted(_) => return Err(ContainerError::Faulted),
                ContainerState::Uninitialized => return Err(ContainerError::NotInitialized),
            }
        };

        let call = root.create_named_child(
            "execution",
            [args.to_provider_set()],
            plugin_names.iter().cloned(),
        );
        debug!(scope = %call.scope().id, args = ?args, "开始执行");

        if let Some(preconditions) = hooks.preconditions() {
            call.invoke(preconditions).await.map_err(|source| {
                debug!(scope = %call.scope().id, "前置条件不满足: {}", source);
                ContainerError::PreconditionFailed { source }
            })?;
        }

        let outcome = call
            .invoke(&hooks.main)
            .await
            .map_err(|source| ContainerError::MainFailed { source })?;

        if let Some(postconditions) = hooks.postconditions() {
            let mut bindings = args.to_provider_set();
            bindings.insert_value(OUTCOME, outcome.clone());

            let verify = root.create_named_child(
                "postconditions",
                [bindings],
                plugin_names.iter().cloned(),
            );
            verify.invoke(postconditions).await.map_err(|source| {
                debug!(scope = %verify.scope().id, "后置条件不满足: {}", source);
                ContainerError::PostconditionFailed { source }
            })?;
        }

        debug!(scope = %call.scope().id, "执行完成");
        Ok(outcome)
    }

    /// 执行并将结果转换为具体类型
    pub async fn execute_as<T>(&self, args: ExecutionArgs) -> ContainerResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.execute(args).await?.downcast::<T>().map_err(|_| {
            ContainerError::from(DependencyError::TypeMismatch {
                name: "main".to_string(),
                expected: std::any::type_name::<T>(),
            })
        })
    }

    /// 销毁容器
    ///
    /// 未启动时为空操作。先通过根注入器调用 teardown 钩子，再释放启动上下文；
    /// 无论是否失败，容器都回到未初始化状态
    pub async fn destroy(&self) -> ContainerResult<()> {
        let mut state = self.state.write().await;

        let (runtime, booted) = match std::mem::take(&mut *state) {
            ContainerState::Uninitialized => {
                debug!("容器未启动，跳过销毁");
                return Ok(());
            }
            ContainerState::Booted(runtime) => (runtime, true),
            ContainerState::Faulted(runtime) => (runtime, false),
        };

        info!(program = self.program.name(), "开始销毁容器");

        let teardown = if booted {
            runtime
                .root
                .invoke(&runtime.hooks.teardown)
                .await
                .map(|_| ())
                .map_err(|e| Box::new(e) as HookError)
        } else {
            Ok(())
        };

        let released = runtime
            .context
            .destroy()
            .await
            .map_err(|e| Box::new(e) as HookError);

        match teardown.and(released) {
            Ok(()) => {
                info!(program = self.program.name(), "容器销毁完成");
                Ok(())
            }
            Err(source) => {
                error!(program = self.program.name(), "容器销毁失败: {}", source);
                Err(ContainerError::TeardownFailed { source })
            }
        }
    }

    /// 当前生命周期状态
    pub async fn state(&self) -> LifecycleState {
        self.state.read().await.lifecycle()
    }

    pub async fn is_booted(&self) -> bool {
        self.state().await.can_execute()
    }

    /// 插件名称
    ///
    /// 启动后返回冻结配置中的名称，启动前返回已添加的名称
    pub async fn plugin_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        match &*state {
            ContainerState::Booted(runtime) | ContainerState::Faulted(runtime) => {
                runtime.plugin_names.to_vec()
            }
            ContainerState::Uninitialized => {
                self.plugins.lock().names().map(String::from).collect()
            }
        }
    }
}

/// 检查钩子依赖
///
/// setup 与 teardown 只能从插件解析；其余钩子的非插件依赖应由执行参数提供
fn check_hooks(root: &Injector, hooks: &Hooks, plugin_names: &[String]) {
    for hook in [&hooks.setup, &hooks.teardown] {
        for name in hook.dependency_list().iter() {
            if !root.can_resolve(name) {
                warn!(hook = hook.name(), dependency = %name, "钩子依赖无法从插件解析");
            }
        }
    }

    let per_call = [
        hooks.preconditions(),
        Some(&hooks.main),
        hooks.postconditions(),
    ];
    for hook in per_call.into_iter().flatten() {
        for name in hook.dependency_list().iter() {
            if name != OUTCOME && !plugin_names.contains(name) {
                debug!(hook = hook.name(), dependency = %name, "依赖需由执行参数提供");
            }
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self
            .state
            .try_read()
            .map(|state| format!("{:?}", state.lifecycle()))
            .unwrap_or_else(|_| "<locked>".to_string());

        f.debug_struct("Container")
            .field("program", &self.program.name())
            .field("resolver", &self.resolver.name())
            .field("state", &state)
            .finish()
    }
}
