//! 题目块提取核心：页面快照 -> 原始题目列表 + 日志事件。
//!
//! 整个模块不做任何 I/O，输入是一份已经带了计算样式标注的 HTML。

pub mod block;
pub mod dom;
pub mod locator;
pub mod signal;

use anyhow::Result;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

use crate::core::models::{PageSnapshot, RawExtraction};
use crate::core::types::LogEvent;

pub use block::extract_block;
pub use locator::{LocatedBlock, OptionElement, collect_option_elements, detect_marker, locate_blocks};
pub use signal::{AttributeSignal, ColorSignal, SignalKind, VisualSignal, build_signal};

/// 提取参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// 四个选项序号标记，按 a/b/c/d 顺序
    pub markers: [String; 4],
    /// 可点击选项元素的选择器
    pub clickable_selector: String,
    /// 从第一个选项向上查找选项网格的最大层数
    pub max_ascent: usize,
    /// 图片地址不超过这个长度视为无效
    pub min_image_url_len: usize,
    /// svg 宽高都不小于这个值才算示意图（px）
    pub min_svg_size: f64,
    /// 广告/标签块的文本特征
    pub tag_tokens: Vec<String>,
    pub signal: SignalKind,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            markers: ["ক".to_string(), "খ".to_string(), "গ".to_string(), "ঘ".to_string()],
            clickable_selector: r#"button, [role="button"], [onclick], label"#.to_string(),
            max_ascent: 10,
            min_image_url_len: 10,
            min_svg_size: 50.0,
            tag_tokens: vec![
                "sponsored".to_string(),
                "advertisement".to_string(),
                "বিজ্ঞাপন".to_string(),
            ],
            signal: SignalKind::Color,
        }
    }
}

/// 一次提取的结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<RawExtraction>,
    pub events: Vec<LogEvent>,
    /// 定位到的题目块数量
    pub located: usize,
}

/// 从已解析的文档中提取全部题目
pub fn extract_from_document(
    document: &Html,
    page_url: &str,
    options: &ExtractOptions,
    signal: &dyn VisualSignal,
) -> Result<Extraction> {
    let candidates = collect_option_elements(document, options)?;
    let blocks = locate_blocks(&candidates, options.max_ascent);
    let base = Url::parse(page_url).ok();

    let mut events = vec![LogEvent::info(format!(
        "找到 {} 个带序号的选项，定位到 {} 个题目块",
        candidates.len(),
        blocks.len()
    ))];

    let records: Vec<RawExtraction> = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            extract_block(block, &candidates, index + 1, base.as_ref(), options, signal, &mut events)
        })
        .collect();

    Ok(Extraction {
        located: blocks.len(),
        records,
        events,
    })
}

/// 从页面快照中提取全部题目
pub fn extract_questions(
    snapshot: &PageSnapshot,
    options: &ExtractOptions,
    signal: &dyn VisualSignal,
) -> Result<Extraction> {
    let document = Html::parse_document(&snapshot.html);
    extract_from_document(&document, &snapshot.url, options, signal)
}
