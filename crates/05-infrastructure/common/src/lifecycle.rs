//! 容器生命周期与注入作用域

/// 注入作用域
///
/// 每个注入器节点持有一个作用域，用于日志关联
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: uuid::Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Scope {
    /// 创建新作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// 创建根作用域
    pub fn root() -> Self {
        Self::new("root")
    }

    /// 创建子作用域
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::new(format!("{}.{}", self.name, name.into()))
    }

    /// 作用域深度，根作用域为 0
    pub fn depth(&self) -> usize {
        self.name.matches('.').count()
    }
}

/// 容器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// 未初始化，或已销毁
    #[default]
    Uninitialized,
    /// 已启动，可执行
    Booted,
    /// setup 失败，只能销毁
    Faulted,
}

impl LifecycleState {
    /// 是否可以启动
    pub fn can_init(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    /// 是否可以执行
    pub fn can_execute(&self) -> bool {
        matches!(self, Self::Booted)
    }

    /// 是否持有启动上下文
    pub fn holds_context(&self) -> bool {
        matches!(self, Self::Booted | Self::Faulted)
    }
}
