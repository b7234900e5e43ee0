//! Centralized integration tests for di-impl crate

use anyhow::Result;
use async_trait::async_trait;
use di_abstractions::{
    DependencyList, DependencyResolver, Dependencies, Injectable, ParameterAnnotator,
    ResolveOptions,
};
use di_impl::{Injector, ProviderSet};
use runtime_common::{DependencyError, HookError, InvokeError, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 链式工厂：step0 <- step1 <- ... <- stepN
fn chain(length: usize) -> ProviderSet {
    let mut set = ProviderSet::new();
    set.factory("step0", Injectable::from_fn("step0", Vec::<String>::new(), |_| Ok(0usize)));
    for i in 1..length {
        let previous = format!("step{}", i - 1);
        let name = format!("step{}", i);
        set.factory(
            name.clone(),
            Injectable::from_fn(name, [previous.clone()], move |deps: Dependencies| {
                Ok(*deps.get::<usize>(&previous)? + 1)
            }),
        );
    }
    set
}

#[tokio::test]
async fn test_deep_factory_chain() -> Result<()> {
    let root = Injector::new(chain(20))?;
    let last = root.resolve("step19").await?;
    assert_eq!(last.downcast_ref::<usize>(), Some(&19));
    assert_eq!(root.cached_instances(), 20);
    Ok(())
}

#[tokio::test]
async fn test_max_depth_exceeded() {
    let root = Injector::with_options(chain(10), ResolveOptions { max_depth: 4 }).unwrap();
    let err = root.resolve("step9").await.unwrap_err();
    assert!(matches!(err, DependencyError::MaxDepthExceeded { max_depth: 4, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_resolution_runs_factory_once() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut set = ProviderSet::new();
    set.factory(
        "pool",
        Injectable::new("pool", Vec::<String>::new(), move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, HookError>(counter.fetch_add(1, Ordering::SeqCst))
            }
        }),
    );
    let root = Injector::new(set)?;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let child = root.create_child(Vec::<ProviderSet>::new(), ["pool"]);
            tokio::spawn(async move {
                let pool = child.resolve("pool").await?;
                Ok::<_, DependencyError>((i, pool))
            })
        })
        .collect();

    let mut first: Option<Value> = None;
    for task in futures::future::join_all(tasks).await {
        let (_, pool) = task??;
        if let Some(seen) = &first {
            assert!(Arc::ptr_eq(seen, &pool));
        }
        first = Some(pool);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_factory_retried_on_next_resolution() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let mut set = ProviderSet::new();
    set.factory(
        "flaky",
        Injectable::from_fn("flaky", Vec::<String>::new(), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err::<u8, HookError>("warming up".into());
            }
            Ok(1u8)
        }),
    );
    let root = Injector::new(set).unwrap();

    assert!(matches!(
        root.resolve("flaky").await,
        Err(DependencyError::FactoryFailed { .. })
    ));
    assert!(root.resolve("flaky").await.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// 先等待再依赖另一个工厂，使两个任务同时持有各自的初始化锁
fn sleepy_factory(name: &str, pause: &str, next: &str) -> Injectable {
    Injectable::new(name, [pause, next], |_| async { Ok::<_, HookError>(()) })
}

fn sleeper(name: &str) -> Injectable {
    Injectable::new(name, Vec::<String>::new(), |_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, HookError>(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_cycle_rejected_before_resolution() {
    let mut set = ProviderSet::new();
    set.factory("s1", sleeper("s1"))
        .factory("s2", sleeper("s2"))
        .factory("a", sleepy_factory("a", "s1", "b"))
        .factory("b", sleepy_factory("b", "s2", "a"));

    let err = Injector::new(set.clone()).unwrap_err();
    assert!(matches!(err, DependencyError::CircularDependency { .. }));

    // 子注入器不缓存工厂，同样的环在两个任务中并发解析时都会报错而不是挂起
    let root = Injector::new(ProviderSet::new()).unwrap();
    let child = root.create_child([set], Vec::<String>::new());
    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(child.resolve("a"), child.resolve("b"))
    })
    .await
    .expect("cyclic resolution must not hang");

    assert!(matches!(outcome.0, Err(DependencyError::CircularDependency { .. })));
    assert!(matches!(outcome.1, Err(DependencyError::CircularDependency { .. })));
}

/// 为所有函数追加固定依赖的注解器
struct TracingAnnotator;

impl ParameterAnnotator for TracingAnnotator {
    fn names_of(&self, injectable: &Injectable) -> DependencyList {
        injectable
            .parameters()
            .iter()
            .cloned()
            .chain(std::iter::once("trace_id".to_string()))
            .collect()
    }
}

#[tokio::test]
async fn test_custom_annotator_controls_dependencies() -> Result<()> {
    let mut set = ProviderSet::new();
    set.value("trace_id", "abc123".to_string());
    let root = Injector::new(set)?;

    let hook = Injectable::from_fn("hook", Vec::<String>::new(), |deps: Dependencies| {
        Ok(deps.get::<String>("trace_id")?.len())
    });
    hook.annotate(&TracingAnnotator);

    let length = root.invoke(&hook).await?;
    assert_eq!(length.downcast_ref::<usize>(), Some(&6));
    Ok(())
}

/// 只依赖解析接口的调用方
#[async_trait]
trait Greeter {
    async fn greet(&self, resolver: &(dyn DependencyResolver)) -> Result<String, InvokeError>;
}

struct Polite;

#[async_trait]
impl Greeter for Polite {
    async fn greet(&self, resolver: &(dyn DependencyResolver)) -> Result<String, InvokeError> {
        let hook = Injectable::from_fn("greet", ["name"], |deps: Dependencies| {
            Ok(format!("Hello, {}", deps.get::<String>("name")?))
        });
        let greeting = resolver.invoke(&hook).await?;
        Ok(greeting.downcast_ref::<String>().cloned().unwrap_or_default())
    }
}

#[tokio::test]
async fn test_injector_behind_resolver_trait() -> Result<()> {
    let mut set = ProviderSet::new();
    set.value("name", "Ada".to_string());
    let root = Injector::new(set)?;

    assert!(DependencyResolver::can_resolve(&root, "name"));
    assert_eq!(Polite.greet(&root).await?, "Hello, Ada");
    Ok(())
}
