//! 批量关键词处理器 - 编排层
//!
//! ## 职责
//!
//! 驱动整个任务的状态机：
//!
//! ```text
//! Idle → Running → {WaitingInterval, WaitingRecovery} → Running → Finished | Failed
//! ```
//!
//! ## 核心功能
//!
//! 1. **批次规划**：去重、过滤账本中已完成的关键词、切分批次
//! 2. **单线程执行**：任意时刻只有一个关键词在处理，只有一个抓取请求在等待
//! 3. **封锁恢复**：检测到封锁后执行恢复策略并重试同一关键词，超过上限则终止
//! 4. **断点续跑**：每批开始前、每条结果写入后保存批次游标，完成时清除
//! 5. **事件广播**：进度、结果、封锁、终止都发送到通知总线
//!
//! ## 设计特点
//!
//! - **唯一写入者**：只有编排器写账本和批次游标
//! - **错误不吞**：除封锁外的任何错误立即终止，已有结果保留在账本中

use std::sync::Arc;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{JobError, JobResult};
use crate::infrastructure::{EventBus, JobEvent, KvStore};
use crate::models::{BatchState, BlockStats, JobState, Keyword, ProgressSnapshot, ResultRecord};
use crate::services::delay::countdown;
use crate::services::{
    BatchPlan, BatchPlanner, FingerprintRotator, PageFetcher, ProgressLedger, RecoveryStrategy,
};
use crate::utils::logging::{log_batch_start, log_plan, print_final_stats, truncate_text};
use crate::workflow::{ItemCtx, QueryFunnel};

/// 终止时附带的上下文
#[derive(Debug)]
pub struct JobFailure {
    /// 失败时正在处理的关键词
    pub keyword: Option<Keyword>,
    pub processed: usize,
    pub total: usize,
    pub cause: JobError,
}

/// 一次运行的最终结果
#[derive(Debug)]
pub enum JobOutcome {
    Finished { processed: usize, total: usize },
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobOutcome::Finished { .. })
    }

    pub fn processed(&self) -> usize {
        match self {
            JobOutcome::Finished { processed, .. } => *processed,
            JobOutcome::Failed(failure) => failure.processed,
        }
    }

    pub fn total(&self) -> usize {
        match self {
            JobOutcome::Finished { total, .. } => *total,
            JobOutcome::Failed(failure) => failure.total,
        }
    }
}

/// 运行中的计数
#[derive(Debug, Clone, Copy)]
struct Progress {
    processed: usize,
    total: usize,
}

pub struct Orchestrator {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    bus: EventBus,
    ledger: ProgressLedger,
    planner: BatchPlanner,
    funnel: QueryFunnel,
    recovery: RecoveryStrategy,
    state: JobState,
}

impl Orchestrator {
    pub async fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn KvStore>,
        bus: EventBus,
    ) -> Result<Self> {
        let ledger = ProgressLedger::open(store.clone(), config.fetch_timeout()).await?;
        let funnel = QueryFunnel::new(&config)?;
        let recovery = RecoveryStrategy::load(
            config.recovery.clone(),
            FingerprintRotator::new(config.identities.clone()),
            store,
            bus.clone(),
            config.fetch_timeout(),
            config.status_interval(),
        )
        .await?;

        Ok(Self {
            planner: BatchPlanner::new(config.chunk_size),
            config,
            fetcher,
            bus,
            ledger,
            funnel,
            recovery,
            state: JobState::Idle,
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn block_stats(&self) -> &BlockStats {
        self.recovery.stats()
    }

    pub fn funnel(&self) -> &QueryFunnel {
        &self.funnel
    }

    /// 上次未完成的批次游标
    pub async fn pending_batch(&self) -> JobResult<Option<BatchState>> {
        self.ledger.load_batch_state().await
    }

    /// 处理一组关键词
    ///
    /// 账本中已有的关键词不会再处理，所以中断后用同样的输入再次调用即可续跑。
    pub async fn run(&mut self, items: Vec<Keyword>) -> JobOutcome {
        self.transition(JobState::Running);

        match self.ledger.load_batch_state().await {
            Ok(Some(previous)) => info!(
                "💾 发现未完成的批次 (第 {} 批, 已处理 {}/{})，已完成的关键词将被跳过",
                previous.batch_index + 1,
                previous.processed_count,
                previous.total_count
            ),
            Ok(None) => {}
            Err(e) => {
                let progress = Progress {
                    processed: 0,
                    total: items.len(),
                };
                return self.fail(None, progress, e);
            }
        }

        let plan = self.planner.plan(&items, self.ledger.completed_keys());
        self.drive(plan, 0).await
    }

    /// 从保存的批次游标继续，不需要重新提供输入
    pub async fn resume(&mut self) -> JobOutcome {
        self.transition(JobState::Running);

        let previous = match self.ledger.load_batch_state().await {
            Ok(Some(previous)) => previous,
            Ok(None) => {
                info!("没有未完成的批次");
                let plan = BatchPlan {
                    chunks: Vec::new(),
                    total_count: 0,
                    already_processed: 0,
                };
                return self.drive(plan, 0).await;
            }
            Err(e) => {
                let progress = Progress {
                    processed: 0,
                    total: 0,
                };
                return self.fail(None, progress, e);
            }
        };

        info!(
            "▶️  从第 {} 批继续，剩余 {} 个关键词",
            previous.batch_index + 1,
            previous.remaining_items.len()
        );
        let mut plan = self
            .planner
            .plan(&previous.remaining_items, self.ledger.completed_keys());
        plan.total_count = previous.total_count;
        plan.already_processed += previous.processed_count;
        self.drive(plan, previous.batch_index).await
    }

    async fn drive(&mut self, plan: BatchPlan, batch_offset: usize) -> JobOutcome {
        let mut progress = Progress {
            processed: plan.already_processed,
            total: plan.total_count,
        };
        let total_batches = plan.chunks.len();
        log_plan(
            plan.total_count,
            plan.already_processed,
            plan.pending_count(),
            total_batches,
        );

        if let Err(e) = self.recovery.restore_identity(self.fetcher.as_ref()).await {
            return self.fail(None, progress, e);
        }

        for (i, chunk) in plan.chunks.iter().enumerate() {
            if i > 0 {
                self.wait_between_batches(progress).await;
            }

            let batch_index = batch_offset + i;
            let mut remaining = plan.remaining_from(i);
            if let Err(e) = self.save_cursor(batch_index, progress, &remaining).await {
                return self.fail(None, progress, e);
            }

            log_batch_start(i + 1, total_batches, chunk.len(), progress.processed, progress.total);
            self.emit_status(format!("第 {}/{} 批开始", i + 1, total_batches), progress);

            for keyword in chunk {
                let ctx = ItemCtx::new(
                    keyword.clone(),
                    batch_index,
                    progress.processed + 1,
                    progress.total,
                );
                let record = match self.process_item(ctx, progress).await {
                    Ok(record) => record,
                    Err(cause) => return self.fail(Some(keyword.clone()), progress, cause),
                };

                remaining.retain(|k| k != keyword);
                if let Err(cause) = self
                    .commit(record, &mut progress, batch_index, &remaining)
                    .await
                {
                    return self.fail(Some(keyword.clone()), progress, cause);
                }

                if !remaining.is_empty() {
                    self.wait_between_items(progress).await;
                }
            }
        }

        self.finish(progress).await
    }

    /// 处理单个关键词，封锁时恢复并重试
    async fn process_item(
        &mut self,
        mut ctx: ItemCtx,
        progress: Progress,
    ) -> JobResult<ResultRecord> {
        let mut detections: u32 = 0;

        loop {
            let cause = match self.funnel.run(self.fetcher.as_ref(), &ctx).await {
                Ok(record) => return Ok(record),
                Err(cause) if cause.is_retryable() => cause,
                Err(cause) => return Err(cause),
            };

            detections += 1;
            let evidence = match &cause {
                JobError::BlockDetected { evidence, .. } => evidence.clone(),
                _ => Vec::new(),
            };
            warn!("{} 🛑 {}", ctx, cause);
            self.bus.emit(JobEvent::BlockInterrupt {
                keyword: ctx.keyword.clone(),
                processed: progress.processed,
                total: progress.total,
                attempt: detections,
                evidence,
            });

            if !self.config.recovery.enabled {
                return Err(cause);
            }

            self.transition(JobState::WaitingRecovery);
            let snapshot = ProgressSnapshot::new(
                Some(ctx.keyword.clone()),
                progress.processed,
                progress.total,
            );
            self.recovery.recover(self.fetcher.as_ref(), &snapshot).await?;

            if detections > self.config.max_retries {
                error!(
                    "{} ❌ 封锁重试已达上限 ({} 次)",
                    ctx, self.config.max_retries
                );
                return Err(cause);
            }

            self.transition(JobState::Running);
            ctx = ctx.next_attempt();
            info!("{} 🔁 恢复完成，重试", ctx);
        }
    }

    /// 写入账本、广播结果、推进游标
    async fn commit(
        &mut self,
        record: ResultRecord,
        progress: &mut Progress,
        batch_index: usize,
        remaining: &[Keyword],
    ) -> JobResult<()> {
        if self.ledger.append(record.clone()).await? {
            progress.processed += 1;
        }

        self.bus.emit(JobEvent::ItemResult {
            record,
            processed: progress.processed,
            total: progress.total,
        });
        self.emit_status(
            format!("已处理 {}/{}", progress.processed, progress.total),
            *progress,
        );

        self.save_cursor(batch_index, *progress, remaining).await
    }

    async fn save_cursor(
        &self,
        batch_index: usize,
        progress: Progress,
        remaining: &[Keyword],
    ) -> JobResult<()> {
        let cursor = BatchState {
            batch_index,
            processed_count: progress.processed,
            total_count: progress.total,
            remaining_items: remaining.to_vec(),
        };
        debug!(
            "保存批次游标: 第 {} 批, 剩余 {}",
            batch_index + 1,
            remaining.len()
        );
        self.ledger.save_batch_state(&cursor).await
    }

    async fn wait_between_items(&mut self, progress: Progress) {
        self.transition(JobState::WaitingInterval);
        let wait = self.config.item_delay.sample();
        debug!("等待 {} 毫秒后处理下一个关键词", wait.as_millis());
        sleep(wait).await;
        self.emit_status("处理中".to_string(), progress);
        self.transition(JobState::Running);
    }

    async fn wait_between_batches(&mut self, progress: Progress) {
        self.transition(JobState::WaitingInterval);
        let wait = self.config.batch_delay.sample();
        info!("⏳ 批次间等待 {} 秒", wait.as_secs());
        let bus = &self.bus;
        countdown(wait, self.config.status_interval(), |remaining| {
            bus.emit(JobEvent::ProgressUpdate {
                status: format!("下一批将在 {} 秒后开始", remaining.as_secs()),
                processed: progress.processed,
                total: progress.total,
            });
        })
        .await;
        self.transition(JobState::Running);
    }

    async fn finish(&mut self, progress: Progress) -> JobOutcome {
        if let Err(e) = self.ledger.clear_batch_state().await {
            return self.fail(None, progress, e);
        }

        self.transition(JobState::Finished);
        self.bus.emit(JobEvent::JobFinished {
            processed: progress.processed,
            total: progress.total,
        });
        print_final_stats(
            true,
            progress.processed,
            progress.total,
            self.recovery.stats(),
            &self.config.output_log_file,
        );

        JobOutcome::Finished {
            processed: progress.processed,
            total: progress.total,
        }
    }

    /// 终止：批次游标保留，供下次续跑
    fn fail(
        &mut self,
        keyword: Option<Keyword>,
        progress: Progress,
        cause: JobError,
    ) -> JobOutcome {
        self.transition(JobState::Failed);
        error!(
            "❌ 任务终止 [{}] 关键词 {:?}: {}",
            cause.kind(),
            keyword.as_ref().map(Keyword::as_str),
            truncate_text(&cause.to_string(), 300)
        );
        self.bus.emit(JobEvent::JobFailed {
            keyword: keyword.clone(),
            processed: progress.processed,
            total: progress.total,
            cause: cause.to_string(),
        });
        print_final_stats(
            false,
            progress.processed,
            progress.total,
            self.recovery.stats(),
            &self.config.output_log_file,
        );

        JobOutcome::Failed(JobFailure {
            keyword,
            processed: progress.processed,
            total: progress.total,
            cause,
        })
    }

    fn emit_status(&self, status: String, progress: Progress) {
        self.bus.emit(JobEvent::ProgressUpdate {
            status,
            processed: progress.processed,
            total: progress.total,
        });
    }

    fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!("非预期的状态转换: {} → {}", self.state, next);
        }
        debug!("状态: {} → {}", self.state, next);
        self.state = next;
    }
}
