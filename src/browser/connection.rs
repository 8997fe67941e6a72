use anyhow::{Context, Result, anyhow};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// 通过调试端口连接已经打开的浏览器，找到要抓取的标签页
pub async fn connect_to_browser_and_page(port: u16, target_url: Option<&str>) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    debug!("尝试连接到现有浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .with_context(|| format!("无法连接到端口 {} 的浏览器，请用 --remote-debugging-port={} 启动", port, port))?;
    info!("✓ 成功连接到端口 {} 的现有浏览器", port);

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(500)).await;

    let pages = browser.pages().await.context("获取页面列表失败")?;
    debug!("当前有 {} 个页面", pages.len());

    if let Some(url) = target_url {
        for p in pages.iter() {
            if let Ok(Some(page_url)) = p.url().await {
                if page_url.contains(url) {
                    info!("✓ 找到目标页面: {}", page_url);
                    let _ = p.activate().await;
                    return Ok((browser, p.clone()));
                }
            }
        }
        info!("没有打开的标签页匹配 {}，新建页面", url);
        let page = browser.new_page(url).await?;
        page.wait_for_navigation().await?;
        return Ok((browser, page));
    }

    // 没指定地址就抓第一个普通网页标签
    for p in pages.iter() {
        if let Ok(Some(page_url)) = p.url().await {
            if page_url.starts_with("http") {
                info!("✓ 使用当前标签页: {}", page_url);
                return Ok((browser, p.clone()));
            }
        }
    }
    Err(anyhow!("浏览器里没有可抓取的网页标签"))
}
