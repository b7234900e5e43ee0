//! # Runtime Common
//!
//! 插件运行时各层共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`Value`] - 类型擦除的注入值
//! - [`ContainerError`] / [`DependencyError`] / [`PluginError`] - 错误分类
//! - [`Scope`] - 注入作用域
//! - [`LifecycleState`] - 容器生命周期状态

pub mod errors;
pub mod lifecycle;
pub mod value;

pub use errors::*;
pub use lifecycle::*;
pub use value::*;
