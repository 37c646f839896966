//! 应用组装
//!
//! 持有浏览器、存储、通知总线和编排器，确保生命周期正确：
//! 1. 初始化日志文件、连接浏览器、打开进度存储
//! 2. 读取关键词文件并运行；文件为空且存在未完成批次时续跑
//! 3. 每次运行后导出 TSV
//! 4. 关闭时等待告警发送完毕

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::browser::BrowserFetcher;
use crate::config::Config;
use crate::infrastructure::{EventBus, JsonFileStore, KvStore, MemoryStore};
use crate::models::load_keywords;
use crate::orchestrator::{JobOutcome, Orchestrator};
use crate::services::export::write_tsv;
use crate::services::{PageFetcher, WebhookAlerter};
use crate::utils::logging::{init_log_file, log_startup};

const ALERT_TIMEOUT: Duration = Duration::from_secs(10);

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
    alert_task: Option<JoinHandle<()>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let store: Arc<dyn KvStore> = if config.persist_progress {
            let store = JsonFileStore::open(&config.state_file).await?;
            info!("💾 进度文件: {}", store.path().display());
            Arc::new(store)
        } else {
            warn!("⚠️  未开启进度持久化，中断后无法续跑");
            Arc::new(MemoryStore::new())
        };

        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(BrowserFetcher::connect(&config.browser).await?);

        Self::with_parts(config, fetcher, store).await
    }

    /// 使用外部提供的抓取方与存储组装
    pub async fn with_parts(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let bus = EventBus::default();

        let alert_task = match &config.slack_webhook_url {
            Some(url) if !url.is_empty() => {
                info!("🔔 已启用 webhook 告警");
                Some(WebhookAlerter::new(url.as_str(), ALERT_TIMEOUT)?.spawn(bus.subscribe()))
            }
            _ => None,
        };

        let orchestrator = Orchestrator::new(config.clone(), fetcher, store, bus).await?;

        Ok(Self {
            config,
            orchestrator,
            alert_task,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<JobOutcome> {
        info!("\n📁 正在读取关键词文件: {}", self.config.keyword_file);
        let keywords = load_keywords(Path::new(&self.config.keyword_file)).await?;

        let outcome = if keywords.is_empty() && self.orchestrator.pending_batch().await?.is_some() {
            info!("关键词文件为空，从未完成的批次继续");
            self.orchestrator.resume().await
        } else {
            if keywords.is_empty() {
                warn!("⚠️ 没有找到待处理的关键词");
            }
            self.orchestrator.run(keywords).await
        };

        if let Err(e) = self.export().await {
            error!("导出结果失败: {:#}", e);
        }

        Ok(outcome)
    }

    /// 把账本全部结果导出为 TSV
    pub async fn export(&self) -> Result<()> {
        write_tsv(
            &self.config.export_file,
            self.orchestrator.ledger().records(),
            self.orchestrator.funnel().categories(),
        )
        .await
    }

    /// 关闭通知总线，等待告警发送完毕
    pub async fn shutdown(self) {
        let Self {
            orchestrator,
            alert_task,
            ..
        } = self;
        drop(orchestrator);

        if let Some(task) = alert_task {
            if tokio::time::timeout(ALERT_TIMEOUT * 2, task).await.is_err() {
                warn!("⚠️  等待告警发送超时");
            }
        }
    }
}
