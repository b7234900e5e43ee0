//! # 插件运行器
//!
//! 加载容器配置，启动一个报价程序，并用命令行参数执行若干次

use anyhow::{anyhow, Context};
use clap::Parser;
use di_abstractions::{ComponentSpec, Dependencies, Injectable, PluginSpec, OUTCOME};
use plugin_container::{Container, ContainerSettings, ExecutionArgs, Program};
use runtime_common::HookError;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "plugin-runner")]
#[command(about = "在插件容器中运行报价程序")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 执行参数，格式为 name=json，可重复
    #[arg(long = "arg", value_parser = parse_arg)]
    args: Vec<(String, Json)>,

    /// 执行次数
    #[arg(long, default_value_t = 1)]
    times: usize,

    /// 日志级别，覆盖配置文件
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_arg(raw: &str) -> Result<(String, Json), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("参数格式应为 name=json: {}", raw))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| Json::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = ContainerSettings::load(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    settings.logging.init()?;

    info!("启动插件运行器");

    let container = Container::new(quote_program()).with_settings(settings);
    register_plugins(&container)?;

    let greeting = container.init_with_settings().await?;
    if let Some(message) = greeting.downcast_ref::<String>() {
        info!("{}", message);
    }

    let mut call_args = ExecutionArgs::new();
    for (name, value) in &args.args {
        call_args.insert(name.clone(), value.clone());
    }

    for round in 1..=args.times {
        match container.execute_as::<Json>(call_args.clone()).await {
            Ok(quote) => println!("{}", quote),
            Err(e) => {
                error!(round, "执行失败: {}", e);
                container.destroy().await?;
                return Err(anyhow!(e).context(format!("第 {} 次执行失败", round)));
            }
        }
    }

    container.destroy().await.context("销毁容器失败")?;
    info!("插件运行器已退出");
    Ok(())
}

/// 报价程序：按目录价格与税率计算订单总价
fn quote_program() -> Program {
    Program::new(
        "quote",
        Injectable::new(
            "main",
            ["catalog", "tax_rate", "item", "quantity"],
            |deps: Dependencies| async move {
                let catalog = deps.get::<HashMap<String, f64>>("catalog")?;
                let tax_rate = deps.get::<f64>("tax_rate")?;
                let item = deps.get::<Json>("item")?;
                let quantity = deps.get::<Json>("quantity")?;

                let item = item.as_str().ok_or("item 必须是字符串")?;
                let quantity = quantity.as_u64().ok_or("quantity 必须是非负整数")?;
                let price = catalog
                    .get(item)
                    .ok_or_else(|| format!("未知商品: {}", item))?;

                let subtotal = price * quantity as f64;
                Ok::<_, HookError>(serde_json::json!({
                    "item": item,
                    "quantity": quantity,
                    "subtotal": subtotal,
                    "total": subtotal * (1.0 + *tax_rate),
                }))
            },
        ),
    )
    .with_setup(Injectable::from_fn(
        "setup",
        ["catalog"],
        |deps: Dependencies| {
            let catalog = deps.get::<HashMap<String, f64>>("catalog")?;
            Ok(format!("目录已加载，共 {} 件商品", catalog.len()))
        },
    ))
    .with_preconditions(Injectable::from_fn(
        "preconditions",
        ["quantity"],
        |deps: Dependencies| {
            let quantity = deps.get::<Json>("quantity")?;
            match quantity.as_u64() {
                Some(n) if n > 0 => Ok(()),
                _ => Err(format!("quantity 必须大于 0: {}", quantity).into()),
            }
        },
    ))
    .with_postconditions(Injectable::from_fn(
        "postconditions",
        [OUTCOME],
        |deps: Dependencies| {
            let quote = deps.get::<Json>(OUTCOME)?;
            match quote["total"].as_f64() {
                Some(total) if total.is_finite() && total >= 0.0 => Ok(()),
                _ => Err(format!("报价无效: {}", quote).into()),
            }
        },
    ))
}

fn register_plugins(container: &Container) -> anyhow::Result<()> {
    container.add_plugin("tax_rate", PluginSpec::value(0.08f64))?;
    container.add_plugin(
        "catalog",
        ComponentSpec::new(Injectable::new(
            "catalog",
            Vec::<String>::new(),
            |_| async {
                let catalog: HashMap<String, f64> = [("apple", 0.5), ("pear", 0.75), ("melon", 3.0)]
                    .into_iter()
                    .map(|(name, price)| (name.to_string(), price))
                    .collect();
                Ok::<_, HookError>(catalog)
            },
        ))
        .with_destroy(|_| async {
            info!("释放商品目录");
            Ok(())
        })
        .into(),
    )?;
    Ok(())
}
