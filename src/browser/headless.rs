use anyhow::Result;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const UA_STRING: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 页面什么时候算加载好了：选项按钮出现，再多等一会儿让前端渲染完
#[derive(Debug, Clone, Copy)]
pub struct PageReady<'a> {
    pub selector: &'a str,
    pub timeout: Duration,
    pub settle: Duration,
}

/// 反复检查直到成立或超时，至少检查一次
pub async fn wait_until<F, Fut>(mut check: F, timeout: Duration, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() + interval > deadline {
            return false;
        }
        sleep(interval).await;
    }
}

/// 启动无头浏览器并打开页面，等到选项按钮渲染出来
pub async fn launch_headless_get_page_browser(url: &str, ready: PageReady<'_>) -> Result<(Browser, Page)> {
    let viewport = Viewport {
        width: 1920,
        height: 1080,
        ..Default::default()
    };

    let config = BrowserConfig::builder()
        .viewport(viewport)
        .arg(format!("--user-agent={}", UA_STRING))
        .build()
        .map_err(anyhow::Error::msg)?;

    let (browser, mut handler) = Browser::launch(config).await?;

    tokio::task::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    let page = browser.new_page("about:blank").await?;
    page.evaluate_on_new_document("Object.defineProperty(navigator, 'webdriver', { get: () => undefined })")
        .await?;

    page.goto(url).await?;
    page.wait_for_navigation().await?;
    info!("🌐 已打开页面: {}", url);

    let (tab, selector) = (&page, ready.selector);
    let found = wait_until(
        move || async move { tab.find_element(selector).await.is_ok() },
        ready.timeout,
        READY_POLL_INTERVAL,
    )
    .await;
    if found {
        debug!("选项按钮已出现: {}", ready.selector);
    } else {
        warn!("⚠️ {} 秒内没有等到选项按钮 ({})，继续抓取", ready.timeout.as_secs(), ready.selector);
    }

    tokio::time::sleep(ready.settle).await;
    Ok((browser, page))
}
