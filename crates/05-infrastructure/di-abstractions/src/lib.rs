//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义按名称注入与插件装配的核心接口。
//!
//! ## 核心接口
//!
//! - [`Injectable`] - 显式声明依赖的可注入函数
//! - [`ParameterAnnotator`] - 依赖列表注解器
//! - [`DependencyResolver`] - 依赖解析器接口
//! - [`PluginResolver`] - 插件装配接口
//! - [`LifecycleProgram`] - 生命周期程序接口

pub mod injectable;
pub mod plugin;
pub mod program;
pub mod resolver;

pub use injectable::*;
pub use plugin::*;
pub use program::*;
pub use resolver::*;
