use anyhow::{Context, Result};
use chromiumoxide::Page;
use std::fs;
use std::path::Path;
use tracing::info;

use super::scripts::SNAPSHOT_JS;
use crate::core::models::PageSnapshot;

/// 在页面里标注计算样式并抓取整页 HTML
pub async fn capture_snapshot(page: &Page) -> Result<PageSnapshot> {
    let snapshot: PageSnapshot = page
        .evaluate(SNAPSHOT_JS)
        .await
        .context("抓取页面快照失败")?
        .into_value()?;
    info!("📸 已抓取页面快照: {} ({} 字节)", snapshot.url, snapshot.html.len());
    Ok(snapshot)
}

/// 读取本地保存的 HTML；页面地址用于解析相对链接和推断考试 id
pub fn load_snapshot_file(path: &Path, page_url: &str) -> Result<PageSnapshot> {
    let html = fs::read_to_string(path)
        .with_context(|| format!("读取 HTML 文件失败: {}", path.display()))?;
    info!("📄 已读取本地快照: {}", path.display());
    Ok(PageSnapshot {
        url: page_url.to_string(),
        html,
    })
}
