//! 编排器状态与可持久化的进度数据

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Keyword;

/// 编排器状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    /// 关键词之间或批次之间的等待
    WaitingInterval,
    /// 封锁后的恢复冷却
    WaitingRecovery,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }

    /// 状态转换是否合法
    ///
    /// 终态可以重新进入 Running（同一个编排器开始新一轮运行）。
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Running) | (Finished, Running) | (Failed, Running) => true,
            (Running, WaitingInterval)
            | (Running, WaitingRecovery)
            | (Running, Finished)
            | (Running, Failed) => true,
            (WaitingInterval, Running) | (WaitingInterval, Failed) => true,
            (WaitingRecovery, Running) | (WaitingRecovery, Failed) => true,
            _ => false,
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::WaitingInterval => "waiting_interval",
            JobState::WaitingRecovery => "waiting_recovery",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 可恢复的批次游标
///
/// 每批开始前以及每条结果写入后持久化，只有在全部完成时清除。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub batch_index: usize,
    pub processed_count: usize,
    pub total_count: usize,
    pub remaining_items: Vec<Keyword>,
}

/// 封锁统计，在进程生命周期内单调累加
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    pub detection_count: u64,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
}

impl BlockStats {
    pub fn record_detection(&mut self, at: DateTime<Utc>) {
        self.detection_count += 1;
        self.recovery_attempts += 1;
        self.last_detection_time = Some(at);
    }

    pub fn record_recovery(&mut self) {
        self.successful_recoveries += 1;
    }
}

/// 通知与告警使用的进度快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub keyword: Option<Keyword>,
    pub processed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn new(keyword: Option<Keyword>, processed: usize, total: usize) -> Self {
        Self {
            keyword,
            processed,
            total,
        }
    }
}
