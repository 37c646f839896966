//! 批次规划
//!
//! 去重（保留首次出现的顺序）→ 过滤账本中已有的关键词 → 按固定大小切分。

use std::collections::HashSet;

use crate::models::Keyword;

/// 规划结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub chunks: Vec<Vec<Keyword>>,
    /// 过滤前的输入总数（含重复）
    pub total_count: usize,
    /// 输入中已在账本里的关键词数
    pub already_processed: usize,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// 从第 `chunk_index` 批开始的全部剩余关键词
    pub fn remaining_from(&self, chunk_index: usize) -> Vec<Keyword> {
        self.chunks
            .iter()
            .skip(chunk_index)
            .flatten()
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    chunk_size: usize,
}

impl BatchPlanner {
    /// 批大小至少为 1
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 去重，保留首次出现的顺序
    pub fn dedupe(input: &[Keyword]) -> Vec<Keyword> {
        let mut seen = HashSet::with_capacity(input.len());
        input
            .iter()
            .filter(|k| seen.insert(*k))
            .cloned()
            .collect()
    }

    pub fn plan(&self, input: &[Keyword], completed: &HashSet<Keyword>) -> BatchPlan {
        let unique = Self::dedupe(input);
        let (done, pending): (Vec<Keyword>, Vec<Keyword>) =
            unique.into_iter().partition(|k| completed.contains(k));

        BatchPlan {
            chunks: pending
                .chunks(self.chunk_size)
                .map(<[Keyword]>::to_vec)
                .collect(),
            total_count: input.len(),
            already_processed: done.len(),
        }
    }
}
