//! 抓取协作方交换的数据

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::models::Keyword;

/// 查询漏斗的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 阶段 A：窄匹配（全部词出现在标题中）
    NarrowMatch,
    /// 阶段 B：标题匹配
    TitleMatch,
    /// 阶段 C：普通查询，提供分类统计
    Broad,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::NarrowMatch => "A/窄匹配",
            Stage::TitleMatch => "B/标题匹配",
            Stage::Broad => "C/普通",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 发往抓取协作方的一次查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: Keyword,
    pub stage: Stage,
    /// 实际发送的查询文本（已带阶段前缀）
    pub text: String,
}

/// 用于封锁判定的页面信号
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSignals {
    pub url: String,
    /// 页面正文片段
    pub content_sample: String,
    /// 页面上存在的结构标记（选择器）
    pub structural_markers: Vec<String>,
    /// 最近的网络请求 URL
    pub recent_network_calls: Vec<String>,
}

/// 普通查询结果中的一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    /// 位置排名（从 1 开始）
    pub rank: u32,
    pub host: String,
}

impl SearchEntry {
    pub fn new(rank: u32, host: impl Into<String>) -> Self {
        Self {
            rank,
            host: host.into(),
        }
    }
}

/// 一次抓取的完整结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub signals: PageSignals,
    /// 命中数，缺失时按 0 处理
    pub hit_count: Option<u64>,
    pub entries: Vec<SearchEntry>,
}
