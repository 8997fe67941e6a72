use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::app::AppConfig;
use crate::browser::{PageReady, connect_to_browser_and_page, launch_headless_get_page_browser};
use crate::console::RunConsole;
use crate::core::models::{PageSnapshot, QuestionRecord, RunInputs};
use crate::core::types::{LogEvent, RunStats};
use crate::extract::{build_signal, extract_questions};
use crate::modules::answer_key::{AnswerKey, AnswerKeyClient, ExamLocator, locate_exam, reconcile};
use crate::modules::browser::{capture_snapshot, load_snapshot_file, stabilize_page};
use crate::modules::storage::{EmitOutcome, ImageFetcher, ReqwestFetcher, emit, materialize_assets};
use crate::utils::text::json_filename;

/// 页面从哪里来
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// 连接已经打开的浏览器
    Attach { port: u16, url: Option<String> },
    /// 启动无头浏览器
    Headless { url: String },
    /// 本地保存的 HTML
    File { path: PathBuf, page_url: String },
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source: PageSource,
    pub exam_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<QuestionRecord>,
    pub stats: RunStats,
    pub outcome: EmitOutcome,
}

fn forward(console: &mut dyn RunConsole, events: &[LogEvent]) {
    for event in events {
        console.append_log_line(&event.line(), event.severity);
    }
}

/// 拿到页面快照；live 页面先滚动一遍再抓
pub async fn acquire_snapshot(source: &PageSource, config: &AppConfig) -> Result<PageSnapshot> {
    match source {
        PageSource::Attach { port, url } => {
            let (browser, page) = connect_to_browser_and_page(*port, url.as_deref()).await?;
            if let Err(e) = stabilize_page(&page, &config.browser.stabilize).await {
                warn!("⚠️ 页面滚动失败，直接抓取当前内容: {}", e);
            }
            let snapshot = capture_snapshot(&page).await;
            // 不关闭用户自己的浏览器，只断开连接
            drop(browser);
            snapshot
        }
        PageSource::Headless { url } => {
            let ready = PageReady {
                selector: &config.extract.clickable_selector,
                timeout: Duration::from_millis(config.browser.ready_timeout_ms),
                settle: Duration::from_millis(config.browser.page_load_delay_ms),
            };
            let (mut browser, page) = launch_headless_get_page_browser(url, ready).await?;
            if let Err(e) = stabilize_page(&page, &config.browser.stabilize).await {
                warn!("⚠️ 页面滚动失败，直接抓取当前内容: {}", e);
            }
            let snapshot = capture_snapshot(&page).await;
            if let Err(e) = browser.close().await {
                debug!("关闭无头浏览器失败: {}", e);
            }
            snapshot
        }
        PageSource::File { path, page_url } => load_snapshot_file(path, page_url),
    }
}

/// 拉取标准答案；任何失败都只记警告
pub async fn fetch_answer_key(
    client: &reqwest::Client,
    config: &AppConfig,
    page_url: &str,
    exam_id: Option<&str>,
    events: &mut Vec<LogEvent>,
) -> Option<AnswerKey> {
    if !config.answer_key.enabled {
        debug!("已关闭答案接口");
        return None;
    }
    let Some(base_url) = config.answer_key.base_url.as_deref() else {
        events.push(LogEvent::warn("未配置答案接口地址，只使用页面上的答案"));
        return None;
    };

    let from_page = locate_exam(page_url);
    let locator = match (exam_id, from_page) {
        (Some(id), page) => ExamLocator {
            exam_id: id.to_string(),
            teacher: page.is_some_and(|p| p.teacher),
        },
        (None, Some(page)) => page,
        (None, None) => {
            events.push(LogEvent::warn(format!("无法从页面地址推断考试 id: {}", page_url)));
            return None;
        }
    };

    let client = AnswerKeyClient::new(client.clone(), base_url);
    match client.fetch(&locator).await {
        Ok(key) => {
            events.push(LogEvent::info(format!("答案接口返回 {} 题", key.len())));
            Some(key)
        }
        Err(e) => {
            events.push(LogEvent::warn(format!("获取标准答案失败，使用页面数据: {:#}", e)));
            None
        }
    }
}

/// 快照之后的全部步骤：提取、对账、图片、输出
pub async fn process_snapshot<F: ImageFetcher>(
    snapshot: &PageSnapshot,
    inputs: &RunInputs,
    exam_id: Option<&str>,
    config: &AppConfig,
    client: &reqwest::Client,
    fetcher: &F,
    console: &mut dyn RunConsole,
) -> Result<RunReport> {
    let mut stats = RunStats::default();

    let extraction = {
        let signal = build_signal(config.extract.signal);
        match extract_questions(snapshot, &config.extract, signal.as_ref()) {
            Ok(extraction) => extraction,
            Err(e) => {
                forward(console, &[LogEvent::error(format!("题目提取失败: {:#}", e))]);
                return Err(e);
            }
        }
    };
    forward(console, &extraction.events);
    stats.located = extraction.located;

    let mut events = Vec::new();
    let key = fetch_answer_key(client, config, &snapshot.url, exam_id, &mut events).await;
    forward(console, &events);

    let reconciled = reconcile(
        extraction.records,
        key.as_ref(),
        &inputs.subject,
        &config.answer_key.align,
    );
    forward(console, &reconciled.events);
    for source in &reconciled.sources {
        stats.add_answer(*source);
    }

    let mut records = reconciled.records;
    let mode = config.assets.asset_mode();
    let materialized = materialize_assets(&mut records, fetcher, &mode, &config.assets).await;
    forward(console, &materialized.events);
    stats.images_assigned = materialized.assigned;
    stats.images_failed = materialized.failed;

    let filename = json_filename(&inputs.filename);
    let outcome = match emit(client, &records, &materialized.bundle, &filename, &config.emit).await {
        Ok(outcome) => outcome,
        Err(e) => {
            forward(console, &[LogEvent::error(format!("题目输出失败: {:#}", e))]);
            return Err(e);
        }
    };
    stats.emitted = records.len();
    forward(console, &[LogEvent::info(outcome.to_string())]);

    info!(
        "📊 定位 {} 题，输出 {} 题；答案来自接口 {} / 页面 {} / 缺失 {}；图片 {} 张，失败 {} 张",
        stats.located,
        stats.emitted,
        stats.answers_from_api,
        stats.answers_from_dom,
        stats.answers_missing,
        stats.images_assigned,
        stats.images_failed
    );

    Ok(RunReport {
        records,
        stats,
        outcome,
    })
}

/// 一次完整的抓取
pub async fn run(config: &AppConfig, request: RunRequest, console: &mut dyn RunConsole) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", id = %run_id);

    async move {
        info!("🚀 开始抓取题目...");
        let snapshot = acquire_snapshot(&request.source, config).await?;

        let defaults = RunInputs {
            filename: config.run.filename.clone(),
            subject: config.run.subject.clone(),
        };
        let inputs = console.prompt_for_inputs(&defaults)?;

        let client = reqwest::Client::new();
        let fetcher = ReqwestFetcher::new(client.clone());
        let report = process_snapshot(
            &snapshot,
            &inputs,
            request.exam_id.as_deref(),
            config,
            &client,
            &fetcher,
            console,
        )
        .await?;

        info!("🎉 处理完成，共 {} 道题", report.stats.emitted);
        Ok(report)
    }
    .instrument(span)
    .await
}
