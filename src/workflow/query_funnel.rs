//! 查询漏斗 - 流程层
//!
//! 核心职责：定义"一个关键词"的完整处理流程
//!
//! 流程顺序：
//! 1. 阶段 A（窄匹配）→ 命中数过多则跳过
//! 2. 阶段 B（标题匹配）→ 命中数过多则跳过
//! 3. 阶段 C（普通查询）→ 分类统计
//!
//! 每次抓取后先做封锁判定。漏斗本身不重试，错误全部交给编排器。

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{JobError, JobResult};
use crate::models::{CategoryTable, FetchedPage, Keyword, ResultRecord, SearchQuery, Stage};
use crate::services::{with_timeout, BlockDetector, DelayRange, PageFetcher};
use crate::workflow::item_ctx::ItemCtx;

/// 跳过阈值：命中数大于等于阈值时提前结束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipThresholds {
    pub narrow_match: u64,
    pub title_match: u64,
}

impl Default for SkipThresholds {
    fn default() -> Self {
        Self {
            narrow_match: 10,
            title_match: 30_000,
        }
    }
}

/// 每个阶段的查询前缀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPrefixes {
    pub narrow_match: String,
    pub title_match: String,
    pub broad: String,
}

impl QueryPrefixes {
    pub fn for_stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::NarrowMatch => &self.narrow_match,
            Stage::TitleMatch => &self.title_match,
            Stage::Broad => &self.broad,
        }
    }

    pub fn query(&self, keyword: &Keyword, stage: Stage) -> SearchQuery {
        SearchQuery {
            keyword: keyword.clone(),
            stage,
            text: format!("{}{}", self.for_stage(stage), keyword),
        }
    }
}

impl Default for QueryPrefixes {
    fn default() -> Self {
        Self {
            narrow_match: "allintitle:".to_string(),
            title_match: "intitle:".to_string(),
            broad: String::new(),
        }
    }
}

/// 查询漏斗
///
/// - 编排单个关键词的三个阶段
/// - 不持有任何资源（浏览器）
/// - 不关心批次与重试
pub struct QueryFunnel {
    thresholds: SkipThresholds,
    prefixes: QueryPrefixes,
    stage_delay: DelayRange,
    fetch_timeout: Duration,
    detector: BlockDetector,
    categories: CategoryTable,
    verbose_logging: bool,
}

impl QueryFunnel {
    pub fn new(config: &Config) -> Result<Self> {
        let detector =
            BlockDetector::from_config(&config.detector).context("封锁检测规则无效")?;
        Ok(Self {
            thresholds: config.thresholds,
            prefixes: config.prefixes.clone(),
            stage_delay: config.stage_delay,
            fetch_timeout: config.fetch_timeout(),
            detector,
            categories: config.categories.clone(),
            verbose_logging: config.verbose_logging,
        })
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub async fn run(&self, fetcher: &dyn PageFetcher, ctx: &ItemCtx) -> JobResult<ResultRecord> {
        ctx.keyword.validate()?;
        let started = Instant::now();

        // ========== 阶段 A: 窄匹配 ==========
        let narrow = self.fetch_stage(fetcher, ctx, Stage::NarrowMatch).await?;
        let narrow_hits = narrow.hit_count.unwrap_or(0);
        if narrow_hits >= self.thresholds.narrow_match {
            info!(
                "{} ⏭️  阶段 A 命中 {} 条 (阈值 {})，跳过",
                ctx, narrow_hits, self.thresholds.narrow_match
            );
            return Ok(ResultRecord::skipped(
                ctx.keyword.clone(),
                Stage::NarrowMatch,
                started.elapsed(),
            ));
        }
        self.pause_between_stages().await;

        // ========== 阶段 B: 标题匹配 ==========
        let title = self.fetch_stage(fetcher, ctx, Stage::TitleMatch).await?;
        let title_hits = title.hit_count.unwrap_or(0);
        if title_hits >= self.thresholds.title_match {
            info!(
                "{} ⏭️  阶段 B 命中 {} 条 (阈值 {})，跳过",
                ctx, title_hits, self.thresholds.title_match
            );
            return Ok(ResultRecord::skipped(
                ctx.keyword.clone(),
                Stage::TitleMatch,
                started.elapsed(),
            ));
        }
        self.pause_between_stages().await;

        // ========== 阶段 C: 普通查询 ==========
        let broad = self.fetch_stage(fetcher, ctx, Stage::Broad).await?;
        let categories = self.categories.aggregate(&broad.entries);

        if self.verbose_logging {
            for (name, stats) in &categories {
                debug!(
                    "{} 分类 {}: {} 条, 最佳排名 {:?}",
                    ctx, name, stats.count, stats.best_rank
                );
            }
        }

        info!(
            "{} ✓ 完成 (A: {} / B: {} / C: {} 条结果)",
            ctx,
            narrow_hits,
            title_hits,
            broad.entries.len()
        );

        Ok(ResultRecord::completed(
            ctx.keyword.clone(),
            narrow_hits,
            title_hits,
            categories,
            started.elapsed(),
        ))
    }

    /// 抓取一个阶段并做封锁判定
    async fn fetch_stage(
        &self,
        fetcher: &dyn PageFetcher,
        ctx: &ItemCtx,
        stage: Stage,
    ) -> JobResult<FetchedPage> {
        let query = self.prefixes.query(&ctx.keyword, stage);
        debug!("{} 🔍 阶段 {}: {}", ctx, stage, query.text);

        let page =
            with_timeout("fetch_page", self.fetch_timeout, fetcher.fetch_page(&query)).await?;

        let verdict = self.detector.evaluate(&page.signals);
        if verdict.blocked {
            return Err(JobError::BlockDetected {
                keyword: ctx.keyword.clone(),
                stage,
                evidence: verdict.evidence_lines(),
            });
        }
        if !verdict.evidence.is_empty() {
            debug!(
                "{} 单一信号不足以判定封锁: {:?}",
                ctx,
                verdict.evidence_lines()
            );
        }

        Ok(page)
    }

    async fn pause_between_stages(&self) {
        let wait = self.stage_delay.sample();
        debug!("阶段间等待 {} 毫秒", wait.as_millis());
        sleep(wait).await;
    }
}
