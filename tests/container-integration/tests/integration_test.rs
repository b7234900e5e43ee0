//! Centralized integration tests for plugin-container crate

use anyhow::Result;
use di_abstractions::{ComponentSpec, Dependencies, Injectable, PluginSpec, OUTCOME};
use plugin_container::{
    Container, ContainerError, ContainerSettings, ExecutionArgs, LifecycleState, Program,
};
use runtime_common::HookError;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 模拟连接池
#[derive(Debug)]
struct Pool {
    dsn: String,
    opened: AtomicUsize,
}

impl Pool {
    fn checkout(&self) -> usize {
        self.opened.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn pooled_program() -> Program {
    Program::new(
        "orders",
        Injectable::new("main", ["pool", "order_id"], |deps: Dependencies| async move {
            let pool = deps.get::<Pool>("pool")?;
            let order_id = deps.get::<u64>("order_id")?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, HookError>(format!("{}#{}@{}", pool.dsn, order_id, pool.checkout()))
        }),
    )
    .with_postconditions(Injectable::new(
        "postconditions",
        [OUTCOME, "order_id"],
        |deps: Dependencies| async move {
            let outcome = deps.get::<String>(OUTCOME)?;
            let order_id = deps.get::<u64>("order_id")?;
            if !outcome.contains(&format!("#{}@", order_id)) {
                return Err::<(), HookError>(format!("outcome {} leaked", outcome).into());
            }
            Ok(())
        },
    ))
}

fn add_pool(container: &Container, released: Arc<AtomicUsize>) -> Result<()> {
    container.add_plugin("dsn", PluginSpec::value("postgres://orders".to_string()))?;
    container.add_plugin(
        "pool",
        ComponentSpec::new(Injectable::new("pool", ["dsn"], |deps: Dependencies| async move {
            let dsn = deps.get::<String>("dsn")?;
            Ok::<_, HookError>(Pool {
                dsn: dsn.as_ref().clone(),
                opened: AtomicUsize::new(0),
            })
        }))
        .with_destroy(move |_| {
            let released = released.clone();
            async move {
                released.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .into(),
    )?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_executions_do_not_leak() -> Result<()> {
    let released = Arc::new(AtomicUsize::new(0));
    let container = Arc::new(Container::new(pooled_program()));
    add_pool(&container, released.clone())?;
    container.init(1000).await?;

    let tasks: Vec<_> = (1..=16u64)
        .map(|order_id| {
            let container = container.clone();
            tokio::spawn(async move {
                container
                    .execute_as::<String>(ExecutionArgs::new().with("order_id", order_id))
                    .await
                    .map(|outcome| (order_id, outcome))
            })
        })
        .collect();

    let mut checkouts = Vec::new();
    for task in futures::future::join_all(tasks).await {
        let (order_id, outcome) = task??;
        assert!(outcome.starts_with(&format!("postgres://orders#{}@", order_id)));
        checkouts.push(outcome);
    }
    assert_eq!(checkouts.len(), 16);

    container.destroy().await?;
    assert_eq!(released.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_in_flight_execution_survives_destroy() -> Result<()> {
    let program = Program::new(
        "slow",
        Injectable::new("main", ["pool"], |deps: Dependencies| async move {
            let pool = deps.get::<Pool>("pool")?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, HookError>(pool.dsn.clone())
        }),
    );
    let container = Arc::new(Container::new(program));
    add_pool(&container, Arc::new(AtomicUsize::new(0)))?;
    container.init(1000).await?;

    let running = {
        let container = container.clone();
        tokio::spawn(async move { container.execute_as::<String>(ExecutionArgs::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    container.destroy().await?;

    assert_eq!(running.await??.as_str(), "postgres://orders");
    assert!(matches!(
        container.execute(ExecutionArgs::new()).await,
        Err(ContainerError::NotInitialized)
    ));
    Ok(())
}

#[tokio::test]
async fn test_json_arguments() -> Result<()> {
    let program = Program::new(
        "adder",
        Injectable::new("main", ["a", "b"], |deps: Dependencies| async move {
            let a = deps.get::<serde_json::Value>("a")?;
            let b = deps.get::<serde_json::Value>("b")?;
            let sum = a.as_i64().unwrap_or_default() + b.as_i64().unwrap_or_default();
            Ok::<_, HookError>(sum)
        }),
    );
    let container = Container::new(program);
    container.init(1000).await?;

    let sum = container
        .execute_as::<i64>(ExecutionArgs::from_json(json!({ "a": 1, "b": 2 }))?)
        .await?;
    assert_eq!(*sum, 3);
    Ok(())
}

#[tokio::test]
async fn test_init_with_settings_from_file() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(file, "boot_timeout_ms = 1500")?;
    writeln!(file, "max_resolution_depth = 16")?;

    let settings = ContainerSettings::load(Some(file.path()))?;
    assert_eq!(settings.boot_timeout_ms, 1500);

    let container = Container::new(Program::new("noop", Injectable::noop("main")))
        .with_settings(settings);
    container.init_with_settings().await?;
    assert_eq!(container.state().await, LifecycleState::Booted);
    assert_eq!(container.settings().max_resolution_depth, 16);

    container.destroy().await?;
    Ok(())
}

#[tokio::test]
async fn test_slow_component_times_out() -> Result<()> {
    let container = Container::new(Program::new("noop", Injectable::noop("main")));
    container.add_plugin(
        "remote",
        PluginSpec::component(Injectable::new(
            "remote",
            Vec::<String>::new(),
            |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, HookError>(())
            },
        )),
    )?;

    let err = container.init(30).await.unwrap_err();
    assert!(err.is_boot_timeout());
    assert_eq!(container.state().await, LifecycleState::Uninitialized);

    // 超时后仍可以再次尝试启动
    assert!(container.init(30).await.unwrap_err().is_boot_timeout());
    Ok(())
}
