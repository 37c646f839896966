//! 封锁检测
//!
//! 对页面信号做多项独立检查，至少两项命中才判定为封锁，
//! 避免单个关键词恰好包含可疑字样时误判。判定是信号的纯函数，不保存状态。

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::models::PageSignals;

/// 判定为封锁所需的最少命中项
pub const MIN_SIGNALS: usize = 2;

/// 证据中保留的原文长度
const SUBJECT_PREVIEW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// 当前 URL 命中挑战页特征
    UrlPattern,
    /// 页面上存在挑战相关元素
    MarkerElement,
    /// 正文包含可疑提示文字
    SuspiciousText,
    /// 最近的网络请求指向挑战端点
    NetworkCall,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::UrlPattern => "url_pattern",
            SignalKind::MarkerElement => "marker_element",
            SignalKind::SuspiciousText => "suspicious_text",
            SignalKind::NetworkCall => "network_call",
        }
    }

    /// URL 类信号只看 scheme、host 和 path，查询串里是用户自己的关键词
    fn subjects(self, signals: &PageSignals) -> Vec<&str> {
        match self {
            SignalKind::UrlPattern => vec![without_query(&signals.url)],
            SignalKind::MarkerElement => signals
                .structural_markers
                .iter()
                .map(String::as_str)
                .collect(),
            SignalKind::SuspiciousText => vec![signals.content_sample.as_str()],
            SignalKind::NetworkCall => signals
                .recent_network_calls
                .iter()
                .map(String::as_str)
                .map(without_query)
                .collect(),
        }
    }
}

/// 去掉 `?` 或 `#` 之后的部分
fn without_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// 一项命中的证据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: SignalKind,
    pub pattern: String,
    pub subject: String,
}

impl Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.kind.name(), self.pattern)
    }
}

/// 单项检查：一组按字面量、忽略大小写匹配的模式
#[derive(Debug, Clone)]
pub struct SignalCheck {
    kind: SignalKind,
    patterns: Vec<String>,
    set: RegexSet,
}

impl SignalCheck {
    pub fn new<I, S>(kind: SignalKind, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = RegexSetBuilder::new(patterns.iter().map(|p| regex::escape(p)))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            kind,
            patterns,
            set,
        })
    }

    /// 返回第一个命中的证据
    pub fn evaluate(&self, signals: &PageSignals) -> Option<Evidence> {
        self.kind.subjects(signals).into_iter().find_map(|subject| {
            self.set.matches(subject).iter().next().map(|idx| Evidence {
                kind: self.kind,
                pattern: self.patterns[idx].clone(),
                subject: subject.chars().take(SUBJECT_PREVIEW).collect(),
            })
        })
    }
}

/// 判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerdict {
    pub blocked: bool,
    pub evidence: Vec<Evidence>,
}

impl BlockVerdict {
    pub fn fired(&self) -> Vec<SignalKind> {
        self.evidence.iter().map(|e| e.kind).collect()
    }

    pub fn evidence_lines(&self) -> Vec<String> {
        self.evidence.iter().map(ToString::to_string).collect()
    }
}

/// 检测规则配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub url_patterns: Vec<String>,
    pub marker_patterns: Vec<String>,
    pub text_patterns: Vec<String>,
    pub network_patterns: Vec<String>,
    pub min_signals: usize,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url_patterns: strings(&[
                "google.com/sorry/",
                "/recaptcha/",
                "sorry/index",
                "/sorry",
                "challenge",
                "captcha",
                "security_check",
            ]),
            marker_patterns: strings(&[
                ".g-recaptcha",
                "#recaptcha",
                "#captcha-form",
                "iframe[src*=\"recaptcha\"]",
                "form[action*=\"sorry\"]",
                "div[id*=\"captcha\"]",
                "iframe[src*=\"challenges\"]",
            ]),
            text_patterns: strings(&[
                "通常と異なるトラフィックが検出されました",
                "ロボットではありません",
                "reCAPTCHA による確認",
                "自動化されたリクエスト",
                "不審なトラフィック",
                "unusual traffic",
                "automated queries",
                "verify you're human",
                "human verification",
            ]),
            network_patterns: strings(&["recaptcha", "captcha", "challenge", "/sorry"]),
            min_signals: MIN_SIGNALS,
        }
    }
}

/// 封锁检测器
#[derive(Debug, Clone)]
pub struct BlockDetector {
    checks: Vec<SignalCheck>,
    min_signals: usize,
}

impl BlockDetector {
    /// 阈值不会低于 [`MIN_SIGNALS`]
    pub fn new(checks: Vec<SignalCheck>, min_signals: usize) -> Self {
        Self {
            checks,
            min_signals: min_signals.max(MIN_SIGNALS),
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, regex::Error> {
        let checks = vec![
            SignalCheck::new(SignalKind::UrlPattern, config.url_patterns.clone())?,
            SignalCheck::new(SignalKind::MarkerElement, config.marker_patterns.clone())?,
            SignalCheck::new(SignalKind::SuspiciousText, config.text_patterns.clone())?,
            SignalCheck::new(SignalKind::NetworkCall, config.network_patterns.clone())?,
        ];
        Ok(Self::new(checks, config.min_signals))
    }

    pub fn evaluate(&self, signals: &PageSignals) -> BlockVerdict {
        let evidence: Vec<Evidence> = self
            .checks
            .iter()
            .filter_map(|check| check.evaluate(signals))
            .collect();
        BlockVerdict {
            blocked: evidence.len() >= self.min_signals,
            evidence,
        }
    }
}
