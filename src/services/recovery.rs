//! 封锁恢复策略
//!
//! 每检测到一次封锁执行一次，按顺序：
//! 1. 记录统计（检测次数、恢复尝试、检测时间）
//! 2. 请求重置会话数据
//! 3. 轮换身份并保存为当前身份
//! 4. 长时间随机冷却，期间定期广播剩余时间
//! 5. 记录一次成功恢复
//!
//! 是否重试同一个关键词由编排器决定。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::JobResult;
use crate::infrastructure::{get_as, set_as, EventBus, JobEvent, KvStore};
use crate::models::{BlockStats, Identity, ProgressSnapshot};
use crate::services::delay::{countdown, DelayRange};
use crate::services::fetcher::{with_timeout, PageFetcher};
use crate::services::fingerprint::FingerprintRotator;

pub const BLOCK_STATS_KEY: &str = "job.block_stats";
pub const IDENTITY_KEY: &str = "job.identity";

/// 恢复策略配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// 关闭后第一次封锁即终止
    pub enabled: bool,
    pub rotate_identity: bool,
    pub reset_session: bool,
    pub cooldown: DelayRange,
    /// 会话重置覆盖的最近时间窗口
    pub session_reset_window_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate_identity: true,
            reset_session: true,
            cooldown: DelayRange::from_secs(60, 300),
            session_reset_window_secs: 3600,
        }
    }
}

pub struct RecoveryStrategy {
    config: RecoveryConfig,
    rotator: FingerprintRotator,
    store: Arc<dyn KvStore>,
    bus: EventBus,
    call_timeout: Duration,
    status_interval: Duration,
    stats: BlockStats,
    identity: Option<Identity>,
}

impl RecoveryStrategy {
    /// 加载已保存的统计与当前身份
    pub async fn load(
        config: RecoveryConfig,
        rotator: FingerprintRotator,
        store: Arc<dyn KvStore>,
        bus: EventBus,
        call_timeout: Duration,
        status_interval: Duration,
    ) -> JobResult<Self> {
        let stats: BlockStats = with_timeout(
            "block_stats.load",
            call_timeout,
            get_as(store.as_ref(), BLOCK_STATS_KEY),
        )
        .await?
        .unwrap_or_default();
        let identity: Option<Identity> = with_timeout(
            "identity.load",
            call_timeout,
            get_as(store.as_ref(), IDENTITY_KEY),
        )
        .await?;

        Ok(Self {
            config,
            rotator,
            store,
            bus,
            call_timeout,
            status_interval,
            stats,
            identity,
        })
    }

    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    pub fn current_identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// 显式重新初始化统计
    pub async fn reset_stats(&mut self) -> JobResult<()> {
        self.stats = BlockStats::default();
        self.persist_stats().await
    }

    /// 启动时把已保存的身份重新应用到抓取方
    pub async fn restore_identity(&self, fetcher: &dyn PageFetcher) -> JobResult<()> {
        if !self.config.rotate_identity {
            return Ok(());
        }
        if let Some(identity) = &self.identity {
            info!("🪪 恢复上次使用的身份: {}", identity.platform);
            with_timeout(
                "apply_identity",
                self.call_timeout,
                fetcher.apply_identity(identity),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn recover(
        &mut self,
        fetcher: &dyn PageFetcher,
        progress: &ProgressSnapshot,
    ) -> JobResult<()> {
        self.stats.record_detection(Utc::now());
        self.persist_stats().await?;
        warn!(
            "🛑 第 {} 次检测到封锁，开始恢复 (成功恢复 {} 次)",
            self.stats.detection_count, self.stats.successful_recoveries
        );

        if self.config.reset_session {
            let window = Duration::from_secs(self.config.session_reset_window_secs);
            info!("🧹 重置最近 {} 秒的会话数据", window.as_secs());
            with_timeout(
                "reset_session",
                self.call_timeout,
                fetcher.reset_session(window),
            )
            .await?;
        }

        if self.config.rotate_identity {
            let identity = self.rotator.next_identity(self.identity.as_ref());
            with_timeout(
                "apply_identity",
                self.call_timeout,
                fetcher.apply_identity(&identity),
            )
            .await?;
            with_timeout(
                "identity.save",
                self.call_timeout,
                set_as(self.store.as_ref(), IDENTITY_KEY, &identity),
            )
            .await?;
            info!("🪪 已轮换身份: {} / {}", identity.platform, identity.locale);
            self.identity = Some(identity);
        }

        let cooldown = self.config.cooldown.sample();
        info!("⏳ 冷却 {} 秒后继续", cooldown.as_secs());
        let bus = &self.bus;
        countdown(cooldown, self.status_interval, |remaining| {
            bus.emit(JobEvent::ProgressUpdate {
                status: format!("封锁冷却中，剩余 {} 秒", remaining.as_secs()),
                processed: progress.processed,
                total: progress.total,
            });
        })
        .await;

        self.stats.record_recovery();
        self.persist_stats().await?;
        info!("✓ 冷却结束");
        Ok(())
    }

    async fn persist_stats(&self) -> JobResult<()> {
        with_timeout(
            "block_stats.save",
            self.call_timeout,
            set_as(self.store.as_ref(), BLOCK_STATS_KEY, &self.stats),
        )
        .await
    }
}
