//! # 依赖注入具体实现
//!
//! 提供按名称解析的注入器、提供者注册表以及默认的插件装配器。
//!
//! - [`ProviderRegistry`] - 将名称到值的映射转换为提供者集合
//! - [`Injector`] - 带父级回退与子作用域的注入器
//! - [`WiringResolver`] - 默认插件装配器

pub mod injector;
pub mod registry;
pub mod wiring;

pub use injector::Injector;
pub use registry::{Provider, ProviderKind, ProviderRegistry, ProviderSet};
pub use wiring::WiringResolver;
