//! 集成测试共用的脚本化抓取方

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use keyword_funnel::models::{FetchedPage, Identity, PageSignals, SearchEntry, SearchQuery, Stage};
use keyword_funnel::services::{DelayRange, PageFetcher};
use keyword_funnel::{Config, Keyword};

/// 按关键词预设行为的抓取方
#[derive(Default)]
pub struct ScriptedFetcher {
    blocks: Mutex<HashMap<String, u32>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    narrow_hits: HashMap<String, u64>,
    queries: Mutex<Vec<SearchQuery>>,
    resets: AtomicUsize,
    identities: Mutex<Vec<Identity>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该关键词的前 `times` 次窄匹配查询返回封锁页
    pub fn block(self, keyword: &str, times: u32) -> Self {
        self.blocks.lock().unwrap().insert(keyword.to_string(), times);
        self
    }

    pub fn fail(mut self, keyword: &str) -> Self {
        self.failing.insert(keyword.to_string());
        self
    }

    /// 永不返回，用于超时
    pub fn hang(mut self, keyword: &str) -> Self {
        self.hanging.insert(keyword.to_string());
        self
    }

    pub fn narrow_hits(mut self, keyword: &str, hits: u64) -> Self {
        self.narrow_hits.insert(keyword.to_string(), hits);
        self
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// 每次窄匹配查询对应的关键词（含重试）
    pub fn narrow_queries(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| q.stage == Stage::NarrowMatch)
            .map(|q| q.keyword.as_str().to_string())
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.identities.lock().unwrap().clone()
    }
}

pub fn blocked_page() -> FetchedPage {
    FetchedPage {
        signals: PageSignals {
            url: "https://www.google.com/sorry/index?continue=search".to_string(),
            content_sample: "Our systems have detected unusual traffic from your computer network"
                .to_string(),
            ..PageSignals::default()
        },
        ..FetchedPage::default()
    }
}

fn result_page() -> FetchedPage {
    FetchedPage {
        hit_count: Some(1_000),
        entries: vec![
            SearchEntry::new(1, "www.example.com"),
            SearchEntry::new(2, "ameblo.jp"),
            SearchEntry::new(3, "detail.chiebukuro.yahoo.co.jp"),
        ],
        ..FetchedPage::default()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, query: &SearchQuery) -> Result<FetchedPage> {
        self.queries.lock().unwrap().push(query.clone());
        let keyword = query.keyword.as_str();

        if self.hanging.contains(keyword) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(keyword) {
            anyhow::bail!("页面解析失败: {}", keyword);
        }

        match query.stage {
            Stage::NarrowMatch => {
                let mut blocks = self.blocks.lock().unwrap();
                if let Some(left) = blocks.get_mut(keyword) {
                    if *left > 0 {
                        *left -= 1;
                        return Ok(blocked_page());
                    }
                }
                Ok(FetchedPage {
                    hit_count: Some(self.narrow_hits.get(keyword).copied().unwrap_or(1)),
                    ..FetchedPage::default()
                })
            }
            Stage::TitleMatch => Ok(FetchedPage {
                hit_count: Some(500),
                ..FetchedPage::default()
            }),
            Stage::Broad => Ok(result_page()),
        }
    }

    async fn reset_session(&self, _window: Duration) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_identity(&self, identity: &Identity) -> Result<()> {
        self.identities.lock().unwrap().push(identity.clone());
        Ok(())
    }
}

/// 测试配置：不写文件，冷却和间隔固定
pub fn test_config(chunk_size: usize) -> Config {
    let mut config = Config {
        chunk_size,
        stage_delay: DelayRange::from_secs(1, 2),
        item_delay: DelayRange::from_secs(1, 2),
        batch_delay: DelayRange::from_secs(10, 10),
        output_log_file: "test_output.txt".to_string(),
        ..Config::default()
    };
    config.recovery.cooldown = DelayRange::from_secs(60, 120);
    config
}

pub fn keywords(values: &[&str]) -> Vec<Keyword> {
    values.iter().map(|v| Keyword::new(*v)).collect()
}
