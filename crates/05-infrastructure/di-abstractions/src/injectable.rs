//! 可注入函数抽象
//!
//! 钩子和工厂通过显式声明的参数名列表描述依赖，
//! 注入器按声明顺序解析这些名称并调用函数。

use futures::FutureExt;
use once_cell::sync::OnceCell;
use runtime_common::{BoxFuture, DependencyError, HookError, Value};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// 依赖名称列表，按参数声明顺序排列
pub type DependencyList = Arc<[String]>;

/// 类型擦除的注入函数
pub type InjectFn =
    Arc<dyn Fn(Dependencies) -> BoxFuture<'static, Result<Value, HookError>> + Send + Sync>;

/// 参数注解器
///
/// 给定一个可注入函数，返回其依赖名称列表。必须是纯函数，且对同一函数结果稳定。
pub trait ParameterAnnotator: Send + Sync {
    /// 提取依赖名称
    fn names_of(&self, injectable: &Injectable) -> DependencyList;
}

/// 默认注解器：直接使用函数声明的参数列表
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredParameters;

impl ParameterAnnotator for DeclaredParameters {
    fn names_of(&self, injectable: &Injectable) -> DependencyList {
        injectable.parameters().iter().cloned().collect()
    }
}

struct InjectableInner {
    name: String,
    parameters: Vec<String>,
    annotated: OnceCell<DependencyList>,
    func: InjectFn,
}

/// 可注入函数
///
/// 克隆开销很小，克隆体共享同一份依赖注解
#[derive(Clone)]
pub struct Injectable {
    inner: Arc<InjectableInner>,
}

impl Injectable {
    /// 从异步函数创建
    pub fn new<I, S, F, Fut, T>(name: impl Into<String>, parameters: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HookError>> + Send + 'static,
        T: Any + Send + Sync,
    {
        Self::new_raw(name, parameters, move |deps| {
            let fut = func(deps);
            async move { fut.await.map(|inner| Arc::new(inner) as Value) }
        })
    }

    /// 从返回 [`Value`] 的异步函数创建，结果不再额外包装
    pub fn new_raw<I, S, F, Fut>(name: impl Into<String>, parameters: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        let func: InjectFn = Arc::new(move |deps| func(deps).boxed());
        Self {
            inner: Arc::new(InjectableInner {
                name: name.into(),
                parameters: parameters.into_iter().map(Into::into).collect(),
                annotated: OnceCell::new(),
                func,
            }),
        }
    }

    /// 从同步函数创建
    pub fn from_fn<I, S, F, T>(name: impl Into<String>, parameters: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Dependencies) -> Result<T, HookError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Self::new_raw(name, parameters, move |deps| {
            let result = func(deps).map(|inner| Arc::new(inner) as Value);
            futures::future::ready(result)
        })
    }

    /// 无依赖、什么也不做的函数
    pub fn noop(name: impl Into<String>) -> Self {
        Self::from_fn(name, Vec::<String>::new(), |_| Ok(()))
    }

    /// 函数名称，用于日志
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 声明的参数名
    pub fn parameters(&self) -> &[String] {
        &self.inner.parameters
    }

    /// 计算并附加依赖列表
    ///
    /// 只有首次调用时使用的注解器生效，之后返回同一份列表
    pub fn annotate(&self, annotator: &dyn ParameterAnnotator) -> DependencyList {
        self.inner
            .annotated
            .get_or_init(|| annotator.names_of(self))
            .clone()
    }

    /// 是否已附加依赖列表
    pub fn is_annotated(&self) -> bool {
        self.inner.annotated.get().is_some()
    }

    /// 依赖列表，未注解时使用 [`DeclaredParameters`]
    pub fn dependency_list(&self) -> DependencyList {
        self.annotate(&DeclaredParameters)
    }

    /// 使用已解析的依赖调用函数
    pub fn call(&self, dependencies: Dependencies) -> BoxFuture<'static, Result<Value, HookError>> {
        (self.inner.func)(dependencies)
    }
}

impl std::fmt::Debug for Injectable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injectable")
            .field("name", &self.inner.name)
            .field("parameters", &self.inner.parameters)
            .field("func", &"<function>")
            .finish()
    }
}

/// 已解析的依赖，按声明顺序排列
#[derive(Clone, Default)]
pub struct Dependencies {
    entries: Vec<(String, Value)>,
}

impl Dependencies {
    /// 按名称列表与值列表组装
    pub fn new(names: &[String], values: Vec<Value>) -> Self {
        Self {
            entries: names.iter().cloned().zip(values).collect(),
        }
    }

    /// 以指定类型获取依赖
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, DependencyError>
    where
        T: Any + Send + Sync,
    {
        let value = self
            .value(name)
            .ok_or_else(|| DependencyError::unresolved(name))?;

        value
            .clone()
            .downcast::<T>()
            .map_err(|_| DependencyError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// 获取未转换的依赖值
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// 按位置获取依赖值
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, value)| value)
    }

    /// 依赖名称
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
