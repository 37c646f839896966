//! 浏览器连接
//!
//! 配置了调试端口时连接已打开的浏览器，否则启动无头浏览器。

use anyhow::{Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::config::BrowserSettings;

/// 连接或启动浏览器，并打开一个空白页面
pub async fn open_browser(settings: &BrowserSettings) -> Result<(Browser, Page)> {
    let (browser, mut handler) = match settings.debug_port {
        Some(port) => {
            let browser_url = format!("http://localhost:{}", port);
            info!("正在连接到浏览器: {}", browser_url);
            Browser::connect(&browser_url).await.map_err(|e| {
                error!("连接浏览器失败: {}", e);
                e
            })?
        }
        None => {
            info!("🚀 启动无头浏览器...");
            let config = BrowserConfig::builder()
                .new_headless_mode()
                .args(vec!["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"])
                .build()
                .map_err(|e| anyhow::anyhow!("配置无头浏览器失败: {}", e))?;
            Browser::launch(config).await.map_err(|e| {
                error!("启动无头浏览器失败: {}", e);
                e
            })?
        }
    };
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let page = browser
        .new_page("about:blank")
        .await
        .context("创建空白页面失败")?;
    info!("✓ 浏览器页面已就绪");

    Ok((browser, page))
}
