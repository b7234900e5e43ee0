//! # 插件运行时容器
//!
//! 将一组命名插件启动为共享的服务注册表，然后针对该注册表反复执行
//! 固定的生命周期：configure → setup → preconditions → main → postconditions，
//! 销毁时运行 teardown。所有依赖均按名称注入。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_abstractions::{Dependencies, Injectable, PluginSpec};
//! use plugin_container::{Container, ExecutionArgs, Program};
//! use runtime_common::HookError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let program = Program::new(
//!         "adder",
//!         Injectable::new("main", ["a", "b"], |deps: Dependencies| async move {
//!             Ok::<_, HookError>(*deps.get::<i64>("a")? + *deps.get::<i64>("b")?)
//!         }),
//!     );
//!
//!     let container = Container::new(program);
//!     container.add_plugin("greeting", PluginSpec::value("hello".to_string()))?;
//!     container.init(5000).await?;
//!
//!     let sum = container
//!         .execute_as::<i64>(ExecutionArgs::new().with("a", 1i64).with("b", 2i64))
//!         .await?;
//!     assert_eq!(*sum, 3);
//!
//!     container.destroy().await?;
//!     Ok(())
//! }
//! ```

pub mod arguments;
pub mod container;
pub mod program;
pub mod settings;


pub use arguments::ExecutionArgs;
pub use container::Container;
pub use program::Program;
pub use settings::{ContainerSettings, LoggingConfig};

// 重新导出错误类型
pub use runtime_common::{ContainerError, ContainerResult, LifecycleState, Phase};
