use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use super::scripts::{SCROLL_METRICS_JS, SCROLL_TOP_JS, scroll_to_js};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StabilizeOptions {
    /// 每一步之间的等待
    pub step_delay_ms: u64,
    /// 滚到底之后的整体等待
    pub settle_delay_ms: u64,
    pub max_steps: usize,
}

impl Default for StabilizeOptions {
    fn default() -> Self {
        Self {
            step_delay_ms: 100,
            settle_delay_ms: 1000,
            max_steps: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollMetrics {
    scroll_height: f64,
    viewport_height: f64,
}

/// 逐步推进的滚动位置。每一步都拿当前页面高度来判断是否到底，懒加载撑高页面后会继续往下滚
#[derive(Debug, Clone)]
pub struct ScrollPlan {
    next_y: u64,
    step: u64,
    taken: usize,
    max_steps: usize,
}

impl ScrollPlan {
    pub fn new(step: u64, max_steps: usize) -> Self {
        Self {
            next_y: 0,
            step: step.max(1),
            taken: 0,
            max_steps,
        }
    }

    /// 还没到底并且步数没用完
    pub fn has_more(&self, height: u64) -> bool {
        self.taken < self.max_steps && self.next_y < height
    }

    /// 按当前高度给出下一个滚动位置
    pub fn advance(&mut self, height: u64) -> Option<u64> {
        if !self.has_more(height) {
            return None;
        }
        let y = self.next_y;
        self.next_y += self.step;
        self.taken += 1;
        Some(y)
    }

    pub fn steps(&self) -> usize {
        self.taken
    }
}

async fn measure(page: &Page) -> Result<(u64, u64)> {
    let metrics: ScrollMetrics = page
        .evaluate(SCROLL_METRICS_JS)
        .await
        .context("读取页面高度失败")?
        .into_value()?;
    Ok((
        metrics.scroll_height.max(0.0) as u64,
        metrics.viewport_height.max(1.0) as u64,
    ))
}

/// 分步滚动整个页面，让懒加载的内容渲染出来，最后回到顶部
pub async fn stabilize_page(page: &Page, options: &StabilizeOptions) -> Result<usize> {
    let (mut height, step) = measure(page).await?;
    info!("📜 正在滚动页面: 初始高度 {}px，步长 {}px", height, step);
    let mut plan = ScrollPlan::new(step, options.max_steps);

    loop {
        while let Some(y) = plan.advance(height) {
            page.evaluate(scroll_to_js(y).as_str()).await?;
            sleep(Duration::from_millis(options.step_delay_ms)).await;
            height = measure(page).await?.0;
        }
        page.evaluate(scroll_to_js(height).as_str()).await?;
        sleep(Duration::from_millis(options.settle_delay_ms)).await;

        // 到底之后还可能再加载一批
        height = measure(page).await?.0;
        if !plan.has_more(height) {
            break;
        }
        debug!("页面高度增长到 {}px，继续滚动", height);
    }

    page.evaluate(SCROLL_TOP_JS).await?;
    debug!("页面已回到顶部，共滚动 {} 步，最终高度 {}px", plan.steps(), height);
    Ok(plan.steps())
}
