//! 结果导出服务 - 业务能力层
//!
//! 把账本中的结果记录导出为 TSV。列顺序跟随分类表。

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::{CategoryTable, Metric, ResultRecord};

const SKIPPED: &str = "skipped";

/// 表头
pub fn headers(table: &CategoryTable) -> Vec<String> {
    let mut columns = vec![
        "keyword".to_string(),
        "narrow_hits".to_string(),
        "title_hits".to_string(),
    ];
    for category in table.categories() {
        columns.push(format!("{}_count", category.name));
        columns.push(format!("{}_best_rank", category.name));
        for sub in &category.subcategories {
            columns.push(format!("{}_{}", category.name, sub.name));
        }
    }
    columns.push("elapsed_secs".to_string());
    columns
}

fn hits_cell(metric: &Metric<u64>) -> String {
    match metric {
        Metric::Value(v) => v.to_string(),
        Metric::Skipped => SKIPPED.to_string(),
    }
}

/// 单条记录对应的一行
pub fn row(record: &ResultRecord, table: &CategoryTable) -> Vec<String> {
    let mut cells = vec![
        sanitize(record.keyword.as_str()),
        hits_cell(&record.narrow_hits),
        hits_cell(&record.title_hits),
    ];

    for category in table.categories() {
        let stats = match &record.categories {
            Metric::Value(breakdown) => {
                Some(breakdown.get(&category.name).cloned().unwrap_or_default())
            }
            Metric::Skipped => None,
        };
        match stats {
            Some(stats) => {
                cells.push(stats.count.to_string());
                cells.push(stats.best_rank.map(|r| r.to_string()).unwrap_or_default());
                for sub in &category.subcategories {
                    let n = stats.breakdown.get(&sub.name).copied().unwrap_or(0);
                    cells.push(n.to_string());
                }
            }
            None => {
                let width = 2 + category.subcategories.len();
                cells.extend(std::iter::repeat(SKIPPED.to_string()).take(width));
            }
        }
    }

    cells.push(format!("{:.1}", record.elapsed_secs()));
    cells
}

/// 制表符和换行会破坏列结构
fn sanitize(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

pub fn to_tsv(records: &[ResultRecord], table: &CategoryTable) -> String {
    let mut out = headers(table).join("\t");
    out.push('\n');
    for record in records {
        out.push_str(&row(record, table).join("\t"));
        out.push('\n');
    }
    out
}

/// 写入 TSV 文件（覆盖）
pub async fn write_tsv(
    path: impl AsRef<Path>,
    records: &[ResultRecord],
    table: &CategoryTable,
) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, to_tsv(records, table))
        .await
        .with_context(|| format!("写入导出文件失败: {}", path.display()))?;
    info!("📄 已导出 {} 条结果到 {}", records.len(), path.display());
    Ok(())
}
