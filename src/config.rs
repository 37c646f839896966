//! 程序配置
//!
//! 加载顺序：默认值 → TOML 配置文件（`KEYWORD_FUNNEL_CONFIG`）→ 环境变量 → 校验

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::CategoryTable;
use crate::services::{DelayRange, DetectorConfig, IdentityPool, RecoveryConfig};
use crate::workflow::{QueryPrefixes, SkipThresholds};

pub const CONFIG_PATH_ENV: &str = "KEYWORD_FUNNEL_CONFIG";

/// 浏览器抓取配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// 连接已打开浏览器的调试端口，未设置时启动无头浏览器
    pub debug_port: Option<u16>,
    /// 查询地址模板，`{query}` 会被替换为编码后的查询文本
    pub search_url_template: String,
    /// 页面加载后的等待时间（毫秒）
    pub settle_ms: u64,
    /// 结果提取脚本文件，未设置时使用内置脚本
    pub extract_script_file: Option<String>,
    /// 需要检查是否存在的元素选择器
    pub marker_selectors: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            debug_port: None,
            search_url_template: "https://www.google.co.jp/search?q={query}&hl=ja".to_string(),
            settle_ms: 2_000,
            extract_script_file: None,
            marker_selectors: DetectorConfig::default().marker_patterns,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每批关键词数量
    pub chunk_size: usize,
    /// 同一关键词遇到封锁后的最大重试次数
    pub max_retries: u32,
    /// 外部调用超时（秒）
    pub fetch_timeout_secs: u64,
    /// 等待期间状态广播间隔（秒）
    pub status_interval_secs: u64,
    pub thresholds: SkipThresholds,
    pub prefixes: QueryPrefixes,
    /// 阶段间等待
    pub stage_delay: DelayRange,
    /// 关键词间等待
    pub item_delay: DelayRange,
    /// 批次间等待
    pub batch_delay: DelayRange,
    pub recovery: RecoveryConfig,
    pub detector: DetectorConfig,
    pub identities: IdentityPool,
    pub categories: CategoryTable,
    pub browser: BrowserSettings,
    /// 关闭后进度只保存在内存中
    pub persist_progress: bool,
    /// 进度保存文件
    pub state_file: String,
    /// 关键词输入文件
    pub keyword_file: String,
    /// 结果导出文件
    pub export_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub slack_webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            max_retries: 3,
            fetch_timeout_secs: 30,
            status_interval_secs: 5,
            thresholds: SkipThresholds::default(),
            prefixes: QueryPrefixes::default(),
            stage_delay: DelayRange::from_secs(5, 10),
            item_delay: DelayRange::from_secs(5, 10),
            batch_delay: DelayRange::from_secs(15, 30),
            recovery: RecoveryConfig::default(),
            detector: DetectorConfig::default(),
            identities: IdentityPool::default(),
            categories: CategoryTable::default(),
            browser: BrowserSettings::default(),
            persist_progress: true,
            state_file: "keyword_funnel_state.json".to_string(),
            keyword_file: "keywords.txt".to_string(),
            export_file: "results.tsv".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            slack_webhook_url: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// 完整加载：配置文件 + 环境变量 + 校验
    pub fn load() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// 只使用默认值与环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        let default = self;
        Self {
            chunk_size: env_parse("CHUNK_SIZE").unwrap_or(default.chunk_size),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(default.max_retries),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS")
                .unwrap_or(default.fetch_timeout_secs),
            status_interval_secs: env_parse("STATUS_INTERVAL_SECS")
                .unwrap_or(default.status_interval_secs),
            thresholds: SkipThresholds {
                narrow_match: env_parse("NARROW_SKIP_THRESHOLD")
                    .unwrap_or(default.thresholds.narrow_match),
                title_match: env_parse("TITLE_SKIP_THRESHOLD")
                    .unwrap_or(default.thresholds.title_match),
            },
            browser: BrowserSettings {
                debug_port: env_parse("BROWSER_DEBUG_PORT").or(default.browser.debug_port),
                ..default.browser
            },
            persist_progress: env_parse("PERSIST_PROGRESS").unwrap_or(default.persist_progress),
            state_file: std::env::var("STATE_FILE").unwrap_or(default.state_file),
            keyword_file: std::env::var("KEYWORD_FILE").unwrap_or(default.keyword_file),
            export_file: std::env::var("EXPORT_FILE").unwrap_or(default.export_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL")
                .ok()
                .or(default.slack_webhook_url),
            ..default
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size >= 1, "chunk_size 必须大于等于 1");
        anyhow::ensure!(self.fetch_timeout_secs > 0, "fetch_timeout_secs 必须大于 0");
        for (name, range) in [
            ("stage_delay", &self.stage_delay),
            ("item_delay", &self.item_delay),
            ("batch_delay", &self.batch_delay),
            ("recovery.cooldown", &self.recovery.cooldown),
        ] {
            anyhow::ensure!(range.is_valid(), "{} 的最小值大于最大值", name);
        }
        anyhow::ensure!(
            self.detector.min_signals >= 2,
            "detector.min_signals 不能小于 2"
        );
        anyhow::ensure!(
            self.browser.search_url_template.contains("{query}"),
            "browser.search_url_template 缺少 {{query}} 占位符"
        );
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}
