//! 关键词（工作项）

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

/// 一个待查询的关键词
///
/// 唯一性按值精确比较，提交后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 检查关键词能否作为查询发送
    pub fn validate(&self) -> JobResult<()> {
        if self.0.trim().is_empty() {
            return Err(self.invalid("关键词为空"));
        }
        if self.0.chars().any(char::is_control) {
            return Err(self.invalid("包含控制字符"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> JobError {
        JobError::InvalidItem {
            value: self.0.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Keyword {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Keyword {
    fn from(value: String) -> Self {
        Self(value)
    }
}
