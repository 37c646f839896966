use crate::models::Keyword;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 解析关键词文本：一行一个，去掉首尾空白，丢弃少于两个字符的行
///
/// 重复项保留，由批次规划器统一去重。
pub fn parse_keywords(text: &str) -> Vec<Keyword> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > 1)
        .map(Keyword::from)
        .collect()
}

/// 从文件加载关键词列表
///
/// 文件不存在时返回空列表（此时只能从已保存的批次状态恢复）。
pub async fn load_keywords(path: &Path) -> Result<Vec<Keyword>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        tracing::warn!("关键词文件不存在: {}", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取关键词文件: {}", path.display()))?;

    let keywords = parse_keywords(&content);
    tracing::info!(
        "从 {} 加载了 {} 个关键词",
        path.file_name().unwrap_or_default().to_string_lossy(),
        keywords.len()
    );

    Ok(keywords)
}
