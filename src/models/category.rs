//! 站点分类表
//!
//! 按主机名子串把普通查询结果归入分类（问答 / 博客 / 社交），
//! 社交分类下再细分到具体平台。

use serde::{Deserialize, Serialize};

use crate::models::{CategoryBreakdown, CategoryStats, SearchEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub name: String,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl Category {
    /// 返回 (是否命中, 命中的第一个子分类)
    fn classify(&self, host: &str) -> Option<Option<&str>> {
        let sub = self
            .subcategories
            .iter()
            .find(|s| s.domains.iter().any(|d| host.contains(d.as_str())))
            .map(|s| s.name.as_str());
        if sub.is_some() || self.domains.iter().any(|d| host.contains(d.as_str())) {
            Some(sub)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// 汇总普通查询结果
    ///
    /// 每个分类都会出现在结果中（没有命中时计数为 0）。
    /// 一条结果可以同时计入多个分类，但在同一分类内只计一次。
    pub fn aggregate(&self, entries: &[SearchEntry]) -> CategoryBreakdown {
        let mut breakdown: CategoryBreakdown = self
            .categories
            .iter()
            .map(|c| {
                let mut stats = CategoryStats::default();
                for sub in &c.subcategories {
                    stats.breakdown.insert(sub.name.clone(), 0);
                }
                (c.name.clone(), stats)
            })
            .collect();

        for entry in entries {
            let host = entry.host.to_lowercase();
            for category in &self.categories {
                if let Some(sub) = category.classify(&host) {
                    if let Some(stats) = breakdown.get_mut(&category.name) {
                        stats.observe(entry.rank, sub);
                    }
                }
            }
        }

        breakdown
    }
}

fn domains(list: &[&str]) -> Vec<String> {
    list.iter().map(|d| d.to_string()).collect()
}

impl Default for CategoryTable {
    fn default() -> Self {
        let sns = [
            ("Tiktok", &["tiktok.com"][..]),
            ("Instagram", &["instagram.com"][..]),
            ("X", &["x.com", "twitter.com"][..]),
            ("Facebook", &["facebook.com"][..]),
            ("Youtube", &["youtube.com"][..]),
            ("Twitch", &["twitch.tv"][..]),
        ];

        Self::new(vec![
            Category {
                name: "QA".to_string(),
                domains: domains(&[
                    "detail.chiebukuro.yahoo.co.jp",
                    "chiebukuro.yahoo.co.jp",
                    "okwave.jp",
                    "oshiete.goo.ne.jp",
                    "komachi.yomiuri.co.jp",
                ]),
                subcategories: Vec::new(),
            },
            Category {
                name: "Blog".to_string(),
                domains: domains(&[
                    "blog.hatena.ne.jp",
                    "ameblo.jp",
                    "plaza.rakuten.co.jp",
                    "note.com",
                    "fanblogs.jp",
                    "cocolog-nifty.com",
                    "tumblr.com",
                    "fc2.com",
                    "blog.goo.ne.jp",
                ]),
                subcategories: Vec::new(),
            },
            Category {
                name: "SNS".to_string(),
                domains: Vec::new(),
                subcategories: sns
                    .iter()
                    .map(|(name, list)| Subcategory {
                        name: name.to_string(),
                        domains: domains(list),
                    })
                    .collect(),
            },
        ])
    }
}
