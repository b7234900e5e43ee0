//! 生命周期程序抽象接口

use crate::injectable::Injectable;
use crate::plugin::PluginConfigBuilder;
use async_trait::async_trait;
use runtime_common::HookError;

/// main 结果在后置条件作用域中的保留名称
pub const OUTCOME: &str = "$outcome";

/// 生命周期程序 trait
///
/// 提供五个可注入钩子以及两个表示可选阶段是否存在的谓词。
/// 钩子访问器返回钩子本身而不是调用结果，容器会在调用前附加依赖列表。
#[async_trait]
pub trait LifecycleProgram: Send + Sync {
    /// 程序名称
    fn name(&self) -> &str;

    /// 配置钩子，在插件解析前修改插件配置
    async fn configure(&self, plugins: &mut PluginConfigBuilder) -> Result<(), HookError> {
        let _ = plugins;
        Ok(())
    }

    /// 启动钩子，通过根注入器调用
    fn setup(&self) -> Injectable;

    /// 销毁钩子，通过根注入器调用
    fn teardown(&self) -> Injectable;

    /// 前置条件钩子
    fn preconditions(&self) -> Injectable;

    /// 主钩子
    fn main(&self) -> Injectable;

    /// 后置条件钩子，可以依赖 [`OUTCOME`]
    fn postconditions(&self) -> Injectable;

    /// 是否存在前置条件
    fn has_preconditions(&self) -> bool;

    /// 是否存在后置条件
    fn has_postconditions(&self) -> bool;
}
