//! 进度账本
//!
//! 已完成结果的追加式记录，同时保存编排器的批次游标，是断点续跑的唯一依据。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::JobResult;
use crate::infrastructure::{get_as, set_as, KvStore};
use crate::models::{BatchState, Keyword, ResultRecord};
use crate::services::with_timeout;

pub const RECORDS_KEY: &str = "ledger.records";
pub const BATCH_STATE_KEY: &str = "job.batch_state";

pub struct ProgressLedger {
    store: Arc<dyn KvStore>,
    records: Vec<ResultRecord>,
    index: HashSet<Keyword>,
    /// 单次存储调用的上限
    call_timeout: Duration,
}

impl ProgressLedger {
    /// 从存储中加载已有记录
    pub async fn open(store: Arc<dyn KvStore>, call_timeout: Duration) -> JobResult<Self> {
        let records: Vec<ResultRecord> =
            with_timeout("ledger.open", call_timeout, get_as(store.as_ref(), RECORDS_KEY))
                .await?
                .unwrap_or_default();

        let mut index = HashSet::with_capacity(records.len());
        for record in &records {
            if !index.insert(record.keyword.clone()) {
                warn!("账本中存在重复记录: {}", record.keyword);
            }
        }

        if !records.is_empty() {
            info!("📒 账本中已有 {} 条结果", records.len());
        }

        Ok(Self {
            store,
            records,
            index,
            call_timeout,
        })
    }

    pub fn contains(&self, keyword: &Keyword) -> bool {
        self.index.contains(keyword)
    }

    pub fn completed_keys(&self) -> &HashSet<Keyword> {
        &self.index
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 追加一条结果
    ///
    /// 同一关键词只会写入一次，重复追加返回 `false`。
    /// 持久化失败时内存中的记录同步回滚。
    pub async fn append(&mut self, record: ResultRecord) -> JobResult<bool> {
        if self.index.contains(&record.keyword) {
            warn!("关键词 {} 已在账本中，忽略重复写入", record.keyword);
            return Ok(false);
        }

        let keyword = record.keyword.clone();
        self.records.push(record);

        let saved = with_timeout(
            "ledger.append",
            self.call_timeout,
            set_as(self.store.as_ref(), RECORDS_KEY, &self.records),
        )
        .await;
        if let Err(e) = saved {
            self.records.pop();
            return Err(e);
        }

        debug!("账本追加: {} (共 {} 条)", keyword, self.records.len());
        self.index.insert(keyword);
        Ok(true)
    }

    pub async fn load_batch_state(&self) -> JobResult<Option<BatchState>> {
        with_timeout(
            "batch_state.load",
            self.call_timeout,
            get_as(self.store.as_ref(), BATCH_STATE_KEY),
        )
        .await
    }

    pub async fn save_batch_state(&self, state: &BatchState) -> JobResult<()> {
        with_timeout(
            "batch_state.save",
            self.call_timeout,
            set_as(self.store.as_ref(), BATCH_STATE_KEY, state),
        )
        .await
    }

    pub async fn clear_batch_state(&self) -> JobResult<()> {
        with_timeout(
            "batch_state.clear",
            self.call_timeout,
            self.store.remove(BATCH_STATE_KEY),
        )
        .await
    }
}
