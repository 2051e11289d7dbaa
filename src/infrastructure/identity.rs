//! 身份提供者
//!
//! 认证本身由外部完成，这里只负责回答"当前用户是谁"

use crate::models::UserId;

/// 身份提供能力
pub trait IdentityProvider: Send + Sync {
    /// 当前用户；未登录时返回 `None`
    fn current_user(&self) -> Option<UserId>;
}

/// 固定身份（命令行或测试使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user_id: UserId) -> Self {
        Self(Some(user_id))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl From<Option<i64>> for StaticIdentity {
    fn from(value: Option<i64>) -> Self {
        Self(value.map(UserId))
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0
    }
}
