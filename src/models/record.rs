//! 单个关键词的结果记录

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{Keyword, Stage};

/// 数值字段：要么有值，要么因提前退出被标记为跳过
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric<T> {
    Value(T),
    Skipped,
}

impl<T> Metric<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Metric::Skipped)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Skipped => None,
        }
    }
}

/// 一个分类在普通查询结果中的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u32,
    /// 最好（最小）的位置排名
    pub best_rank: Option<u32>,
    /// 子分类计数
    pub breakdown: BTreeMap<String, u32>,
}

impl CategoryStats {
    /// 记录一条命中，排名取最小值，相同排名保留先出现的
    pub fn observe(&mut self, rank: u32, subcategory: Option<&str>) {
        self.count += 1;
        match self.best_rank {
            Some(best) if best <= rank => {}
            _ => self.best_rank = Some(rank),
        }
        if let Some(name) = subcategory {
            *self.breakdown.entry(name.to_string()).or_insert(0) += 1;
        }
    }
}

pub type CategoryBreakdown = BTreeMap<String, CategoryStats>;

/// 结果记录，创建后不再修改，只写入账本一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub keyword: Keyword,
    pub narrow_hits: Metric<u64>,
    pub title_hits: Metric<u64>,
    pub categories: Metric<CategoryBreakdown>,
    /// 触发跳过的阶段
    pub skipped_at: Option<Stage>,
    pub elapsed_ms: u64,
}

impl ResultRecord {
    /// 完整结果
    pub fn completed(
        keyword: Keyword,
        narrow_hits: u64,
        title_hits: u64,
        categories: CategoryBreakdown,
        elapsed: Duration,
    ) -> Self {
        Self {
            keyword,
            narrow_hits: Metric::Value(narrow_hits),
            title_hits: Metric::Value(title_hits),
            categories: Metric::Value(categories),
            skipped_at: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// 跳过结果：所有数值字段统一标记
    pub fn skipped(keyword: Keyword, stage: Stage, elapsed: Duration) -> Self {
        Self {
            keyword,
            narrow_hits: Metric::Skipped,
            title_hits: Metric::Skipped,
            categories: Metric::Skipped,
            skipped_at: Some(stage),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped_at.is_some()
    }

    /// 处理耗时（秒，保留一位小数）
    pub fn elapsed_secs(&self) -> f64 {
        (self.elapsed_ms as f64 / 100.0).round() / 10.0
    }
}
