//! 注入值类型

use std::any::Any;
use std::sync::Arc;

pub use futures::future::BoxFuture;

/// 注册表中的值
///
/// 插件实例、调用参数和 main 的结果都以类型擦除的共享指针保存
pub type Value = Arc<dyn Any + Send + Sync>;

/// 将具体值包装为 [`Value`]
pub fn value<T>(inner: T) -> Value
where
    T: Any + Send + Sync,
{
    Arc::new(inner)
}
