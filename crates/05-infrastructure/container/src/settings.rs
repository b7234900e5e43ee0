//! 容器配置
//!
//! 配置来源依次为可选的配置文件和 `PLUGIN_` 前缀的环境变量，后者覆盖前者。

use runtime_common::{ContainerError, ContainerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PLUGIN";

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// 插件解析超时（毫秒）
    pub boot_timeout_ms: u64,
    /// 依赖解析最大深度
    pub max_resolution_depth: usize,
    /// 启动时检查钩子依赖是否可解析
    pub validate_dependencies: bool,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            boot_timeout_ms: 5000,
            max_resolution_depth: 100,
            validate_dependencies: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl ContainerSettings {
    /// 从环境变量加载
    pub fn from_env() -> ContainerResult<Self> {
        Self::load(None::<&Path>)
    }

    /// 从配置文件和环境变量加载，文件不存在时忽略
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> ContainerResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            debug!("加载容器配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ContainerError::InvalidSettings {
                message: e.to_string(),
            })?;

        settings.validate()?;
        info!(
            boot_timeout_ms = settings.boot_timeout_ms,
            max_resolution_depth = settings.max_resolution_depth,
            "容器配置加载完成"
        );
        Ok(settings)
    }

    /// 校验配置取值
    pub fn validate(&self) -> ContainerResult<()> {
        if self.boot_timeout_ms == 0 {
            return Err(ContainerError::InvalidSettings {
                message: "boot_timeout_ms 必须大于 0".to_string(),
            });
        }
        if self.max_resolution_depth == 0 {
            return Err(ContainerError::InvalidSettings {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        self.logging.max_level()?;
        Ok(())
    }

    /// 设置启动超时
    pub fn with_boot_timeout(mut self, timeout_ms: u64) -> Self {
        self.boot_timeout_ms = timeout_ms;
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置是否检查钩子依赖
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_dependencies = enabled;
        self
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_millis(self.boot_timeout_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 解析日志级别
    pub fn max_level(&self) -> ContainerResult<tracing::Level> {
        self.level
            .parse::<tracing::Level>()
            .map_err(|_| ContainerError::InvalidSettings {
                message: format!("无效的日志级别: {}", self.level),
            })
    }

    /// 初始化全局日志订阅者
    ///
    /// 容器自身从不调用，由应用程序决定是否启用
    pub fn init(&self) -> ContainerResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.max_level()?)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| ContainerError::InvalidSettings {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
