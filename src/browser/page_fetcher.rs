//! 浏览器抓取方 - 基础设施层
//!
//! 持有唯一的 page 资源，实现 `PageFetcher`：
//! - 导航到查询地址并等待页面稳定
//! - 用通用脚本收集封锁判定信号
//! - 用可配置的提取脚本读取命中数与结果列表
//! - 通过 CDP 清除会话数据、覆盖身份

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCacheParams, ClearBrowserCookiesParams, SetUserAgentOverrideParams,
};
use chromiumoxide::{Browser, Page};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::connection::open_browser;
use crate::config::BrowserSettings;
use crate::models::{FetchedPage, Identity, PageSignals, SearchEntry, SearchQuery};
use crate::services::PageFetcher;

/// 正文片段的最大长度
const CONTENT_SAMPLE_CHARS: usize = 2_000;
/// 保留的最近网络请求数量
const RECENT_CALLS: usize = 50;

/// 内置提取脚本：返回结果统计原文，带标题的链接按顺序作为结果
const DEFAULT_EXTRACT_SCRIPT: &str = r#"
(() => {
    const stats = document.querySelector('#result-stats');
    const entries = [];
    document.querySelectorAll('a[href] h3').forEach((h3) => {
        const link = h3.closest('a');
        try {
            const host = new URL(link.href).hostname;
            entries.push({ rank: entries.length + 1, host });
        } catch (e) {}
    });
    return { hitText: stats ? stats.textContent : null, entries };
})()
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Extracted {
    /// 自定义脚本可以直接给出数字
    hit_count: Option<u64>,
    hit_text: Option<String>,
    entries: Vec<SearchEntry>,
}

impl Extracted {
    fn hits(&self) -> Option<u64> {
        self.hit_count.or_else(|| self.hit_text.as_deref().and_then(parse_hit_count))
    }
}

/// 取统计文字中的第一个数字
///
/// `約 1,230 件 （0.35 秒）` 中只有 `1,230` 是命中数，后面是耗时。
pub fn parse_hit_count(text: &str) -> Option<u64> {
    let number = Regex::new(r"[0-9][0-9,]*").ok()?.find(text)?;
    number.as_str().replace(',', "").parse().ok()
}

/// 构造信号收集脚本
fn signal_script(marker_selectors: &[String]) -> Result<String> {
    let selectors = serde_json::to_string(marker_selectors)?;
    Ok(format!(
        r#"
(() => {{
    const selectors = {selectors};
    const markers = selectors.filter((s) => {{
        try {{ return document.querySelector(s) !== null; }} catch (e) {{ return false; }}
    }});
    const calls = performance.getEntriesByType('resource').slice(-{RECENT_CALLS}).map((e) => e.name);
    const text = document.body ? document.body.innerText : '';
    return {{
        url: location.href,
        contentSample: text.slice(0, {CONTENT_SAMPLE_CHARS}),
        structuralMarkers: markers,
        recentNetworkCalls: calls,
    }};
}})()
"#
    ))
}

pub struct BrowserFetcher {
    // 保持浏览器连接存活
    _browser: Browser,
    page: Page,
    settings: BrowserSettings,
    signal_script: String,
    extract_script: String,
}

impl BrowserFetcher {
    pub async fn connect(settings: &BrowserSettings) -> Result<Self> {
        let extract_script = match &settings.extract_script_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("读取提取脚本失败: {}", path))?,
            None => DEFAULT_EXTRACT_SCRIPT.to_string(),
        };
        let signal_script = signal_script(&settings.marker_selectors)?;
        let (browser, page) = open_browser(settings).await?;

        Ok(Self {
            _browser: browser,
            page,
            settings: settings.clone(),
            signal_script,
            extract_script,
        })
    }

    pub fn search_url(&self, query: &SearchQuery) -> String {
        render_search_url(&self.settings.search_url_template, &query.text)
    }

    /// 执行 JS 代码并反序列化为指定类型
    async fn eval_as<T: DeserializeOwned>(&self, js_code: &str) -> Result<T> {
        let result = self.page.evaluate(js_code.to_string()).await?;
        Ok(result.into_value()?)
    }
}

pub fn render_search_url(template: &str, text: &str) -> String {
    template.replace("{query}", &urlencoding::encode(text))
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch_page(&self, query: &SearchQuery) -> Result<FetchedPage> {
        let url = self.search_url(query);
        debug!("导航到: {}", url);
        self.page
            .goto(url.as_str())
            .await
            .with_context(|| format!("导航失败: {}", url))?;
        sleep(Duration::from_millis(self.settings.settle_ms)).await;

        let signals: PageSignals = self
            .eval_as(&self.signal_script)
            .await
            .context("收集页面信号失败")?;
        let extracted: Extracted = self
            .eval_as(&self.extract_script)
            .await
            .context("提取查询结果失败")?;

        Ok(FetchedPage {
            signals,
            hit_count: extracted.hits(),
            entries: extracted.entries,
        })
    }

    async fn reset_session(&self, window: Duration) -> Result<()> {
        // CDP 不支持按时间窗口清除，这里清除全部 cookie 与缓存
        debug!("清除会话数据 (请求窗口 {} 秒)", window.as_secs());
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .context("清除 cookie 失败")?;
        self.page
            .execute(ClearBrowserCacheParams::default())
            .await
            .context("清除缓存失败")?;
        Ok(())
    }

    async fn apply_identity(&self, identity: &Identity) -> Result<()> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(identity.user_agent.clone())
            .accept_language(identity.locale.clone())
            .platform(identity.platform.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("构造 UA 参数失败: {}", e))?;
        self.page
            .execute(user_agent)
            .await
            .context("覆盖 UA 失败")?;

        let metrics = SetDeviceMetricsOverrideParams::new(
            i64::from(identity.viewport.width),
            i64::from(identity.viewport.height),
            1.0,
            false,
        );
        self.page
            .execute(metrics)
            .await
            .context("覆盖视口失败")?;

        info!(
            "🪪 已应用身份 {} {}x{}",
            identity.platform, identity.viewport.width, identity.viewport.height
        );
        Ok(())
    }
}
