//! 错误类型定义

use std::fmt;
use thiserror::Error;

/// 钩子、工厂与插件初始化函数返回的错误类型
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// 启动超时时的诊断信息
pub const BOOT_TIMEOUT_MESSAGE: &str =
    "The context failed to boot in a timely fashion. Check your plugins and box connectivity";

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("依赖未注册: {name}")]
    UnresolvedDependency { name: String },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("依赖解析深度超过上限 {max_depth}: {dependency_chain}")]
    MaxDepthExceeded {
        max_depth: usize,
        dependency_chain: String,
    },

    #[error("依赖类型不匹配: {name}, 期望类型: {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("工厂执行失败: {name}, 原因: {source}")]
    FactoryFailed { name: String, source: HookError },
}

impl DependencyError {
    /// 创建未注册依赖错误
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::UnresolvedDependency { name: name.into() }
    }

    /// 未能解析的依赖名称
    pub fn unresolved_name(&self) -> Option<&str> {
        match self {
            Self::UnresolvedDependency { name } => Some(name),
            _ => None,
        }
    }
}

/// 注入调用错误
///
/// 区分依赖解析失败与被调用函数自身的失败
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("钩子执行失败: {0}")]
    Hook(#[source] HookError),
}

impl InvokeError {
    /// 获取钩子自身抛出的错误
    pub fn hook_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Hook(source) => Some(source.as_ref()),
            Self::Dependency(_) => None,
        }
    }

    /// 获取依赖解析错误
    pub fn dependency_error(&self) -> Option<&DependencyError> {
        match self {
            Self::Dependency(source) => Some(source),
            Self::Hook(_) => None,
        }
    }
}

/// 插件装配错误类型
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("插件引用不存在: {plugin} -> {reference}")]
    UnknownReference { plugin: String, reference: String },

    #[error("插件循环依赖: {dependency_chain}")]
    CircularReference { dependency_chain: String },

    #[error("插件初始化失败: {plugin}, 原因: {source}")]
    InitializationFailed { plugin: String, source: HookError },

    #[error("插件销毁失败: {plugin}, 原因: {source}")]
    DestroyFailed { plugin: String, source: HookError },
}

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Boot,
    Setup,
    Precondition,
    Main,
    Postcondition,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configure",
            Self::Boot => "boot",
            Self::Setup => "setup",
            Self::Precondition => "preconditions",
            Self::Main => "main",
            Self::Postcondition => "postconditions",
            Self::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// 容器错误类型
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("{message} (超时: {timeout_ms}ms)")]
    BootTimeout { timeout_ms: u64, message: String },

    #[error("插件上下文启动失败: {source}")]
    BootFailure { source: PluginError },

    #[error("configure 钩子执行失败: {source}")]
    ConfigureFailed { source: HookError },

    #[error("setup 钩子执行失败: {source}")]
    SetupFailed { source: InvokeError },

    #[error("前置条件不满足: {source}")]
    PreconditionFailed { source: InvokeError },

    #[error("main 执行失败: {source}")]
    MainFailed { source: InvokeError },

    #[error("后置条件不满足: {source}")]
    PostconditionFailed { source: InvokeError },

    #[error("容器销毁失败: {source}")]
    TeardownFailed { source: HookError },

    #[error("依赖注入错误: {source}")]
    Dependency {
        #[from]
        source: DependencyError,
    },

    #[error("容器已初始化")]
    AlreadyInitialized,

    #[error("容器未初始化或已销毁")]
    NotInitialized,

    #[error("容器处于故障状态: setup 未成功完成")]
    Faulted,

    #[error("容器正在启动或销毁，暂时不能修改插件")]
    Busy,

    #[error("容器配置无效: {message}")]
    InvalidSettings { message: String },
}

impl ContainerError {
    /// 失败发生的生命周期阶段
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::ConfigureFailed { .. } => Some(Phase::Configure),
            Self::BootTimeout { .. } | Self::BootFailure { .. } => Some(Phase::Boot),
            Self::SetupFailed { .. } => Some(Phase::Setup),
            Self::PreconditionFailed { .. } => Some(Phase::Precondition),
            Self::MainFailed { .. } => Some(Phase::Main),
            Self::PostconditionFailed { .. } => Some(Phase::Postcondition),
            Self::TeardownFailed { .. } => Some(Phase::Teardown),
            _ => None,
        }
    }

    /// 阶段错误中包裹的注入调用错误
    pub fn invoke_error(&self) -> Option<&InvokeError> {
        match self {
            Self::SetupFailed { source }
            | Self::PreconditionFailed { source }
            | Self::MainFailed { source }
            | Self::PostconditionFailed { source } => Some(source),
            _ => None,
        }
    }

    /// 是否为启动超时
    pub fn is_boot_timeout(&self) -> bool {
        matches!(self, Self::BootTimeout { .. })
    }
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InvokeResult<T> = Result<T, InvokeError>;
pub type PluginResult<T> = Result<T, PluginError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
