//! 关键词处理上下文
//!
//! 封装"我正在处理第几批的第几个关键词、第几次尝试"这一信息

use std::fmt::Display;

use crate::models::Keyword;

/// 关键词处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    pub keyword: Keyword,

    /// 批次索引（从0开始）
    pub batch_index: usize,

    /// 在全部关键词中的位置（从1开始，仅用于日志显示）
    pub position: usize,

    pub total: usize,

    /// 当前尝试次数（从1开始）
    pub attempt: u32,
}

impl ItemCtx {
    pub fn new(keyword: Keyword, batch_index: usize, position: usize, total: usize) -> Self {
        Self {
            keyword,
            batch_index,
            position,
            total,
            attempt: 1,
        }
    }

    /// 重试同一个关键词
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次#{} 关键词 {}/{} \"{}\"",
            self.batch_index + 1,
            self.position,
            self.total,
            self.keyword
        )?;
        if self.attempt > 1 {
            write!(f, " 第{}次尝试", self.attempt)?;
        }
        f.write_str("]")
    }
}
