//! 依赖注入实现的集成测试

use di_abstractions::{
    DeclaredParameters, Dependencies, Injectable, PluginConfigBuilder, PluginResolver, PluginSpec,
};
use di_impl::{Injector, ProviderRegistry, ProviderSet, WiringResolver};
use runtime_common::{DependencyError, HookError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 测试服务
#[derive(Debug)]
struct Greeter {
    prefix: String,
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        format!("{}, {}", self.prefix, name)
    }
}

#[tokio::test]
async fn test_wired_context_feeds_root_injector() {
    let mut builder = PluginConfigBuilder::new();
    builder
        .add_plugin("prefix", PluginSpec::value("Hello".to_string()))
        .add_plugin(
            "greeter",
            PluginSpec::component(Injectable::new(
                "greeter",
                ["prefix"],
                |deps: Dependencies| async move {
                    let prefix = deps.get::<String>("prefix")?;
                    Ok::<_, HookError>(Greeter {
                        prefix: prefix.as_ref().clone(),
                    })
                },
            )),
        );

    let context = WiringResolver::new().resolve(&builder.build()).await.unwrap();
    let root = Injector::new(ProviderRegistry::from_boot_context(&context)).unwrap();

    let main = Injectable::new("main", ["greeter"], |deps: Dependencies| async move {
        let greeter = deps.get::<Greeter>("greeter")?;
        Ok::<_, HookError>(greeter.greet("world"))
    });
    main.annotate(&DeclaredParameters);

    let result = root.invoke(&main).await.unwrap();
    assert_eq!(result.downcast_ref::<String>().unwrap(), "Hello, world");
}

#[tokio::test]
async fn test_factory_plugin_memoized_on_root_only() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut builder = PluginConfigBuilder::new();
    builder.add_plugin(
        "session",
        PluginSpec::factory(Injectable::from_fn("session", Vec::<String>::new(), move |_| {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        })),
    );

    let context = WiringResolver::new().resolve(&builder.build()).await.unwrap();
    let root = Injector::new(ProviderRegistry::from_boot_context(&context)).unwrap();

    let first = root.resolve("session").await.unwrap();
    let second = root.resolve("session").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 子注入器回退到根注入器，复用根缓存
    let child = root.create_child(Vec::<ProviderSet>::new(), ["session"]);
    child.resolve("session").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_execution_scope_cannot_see_unlisted_plugins() {
    let mut root_set = ProviderSet::new();
    root_set.value("db", "postgres".to_string()).value("secret", 42u32);
    let root = Injector::new(root_set).unwrap();

    let mut args = ProviderSet::new();
    args.value("user", "alice".to_string());
    let child = root.create_child([args], ["db"]);

    assert!(child.can_resolve("user"));
    assert!(child.can_resolve("db"));
    assert!(!child.can_resolve("secret"));

    let err = child.resolve("secret").await.unwrap_err();
    assert_eq!(err.unresolved_name(), Some("secret"));
}

#[test]
fn test_resolve_from_blocking_context() {
    let mut set = ProviderSet::new();
    set.value("answer", 42i64);
    let root = Injector::new(set).unwrap();

    let value = tokio_test::block_on(root.resolve("answer")).unwrap();
    assert_eq!(value.downcast_ref::<i64>(), Some(&42));
}

#[tokio::test]
async fn test_static_cycle_check_on_wired_factories() {
    let mut builder = PluginConfigBuilder::new();
    builder
        .add_plugin(
            "left",
            PluginSpec::factory(Injectable::from_fn("left", ["right"], |_| Ok(()))),
        )
        .add_plugin(
            "right",
            PluginSpec::factory(Injectable::from_fn("right", ["left"], |_| Ok(()))),
        );

    let context = WiringResolver::new().resolve(&builder.build()).await.unwrap();
    let providers = ProviderRegistry::from_boot_context(&context);
    assert!(matches!(
        providers.detect_cycles(),
        Err(DependencyError::CircularDependency { .. })
    ));
}
