use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

use anyhow::{Result, anyhow};

use crate::core::models::OptionKey;
use crate::extract::ExtractOptions;
use crate::extract::dom::{element_children, element_parent, flat_text, is_within};

/// 选项序号后面可能跟着的分隔符
const MARKER_SEPARATORS: &[char] = &['.', ')', ':', '-', '।', '|', ']', '．', '）', '、'];

/// 标记后紧跟字母、数字或组合符号（如 "্"、"া"）说明只是某个词的开头
static WORD_CONTINUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N}\p{M}]").expect("valid word continuation regex"));

/// 一个带序号标记的可点击选项元素
#[derive(Debug, Clone, Copy)]
pub struct OptionElement<'a> {
    pub element: ElementRef<'a>,
    pub key: OptionKey,
}

/// 定位到的一道题：题目容器 + 选项网格
#[derive(Debug, Clone, Copy)]
pub struct LocatedBlock<'a> {
    pub container: ElementRef<'a>,
    pub grid: ElementRef<'a>,
}

/// 判断文本是否以某个序号标记开头，返回对应选项键和去掉标记后的正文
pub fn detect_marker<'t>(text: &'t str, markers: &[String; 4]) -> Option<(OptionKey, &'t str)> {
    let text = text.trim_start();
    for (index, marker) in markers.iter().enumerate() {
        if marker.is_empty() {
            continue;
        }
        let Some(rest) = text.strip_prefix(marker.as_str()) else {
            continue;
        };
        if WORD_CONTINUATION_RE.is_match(rest) {
            continue;
        }
        let body = rest
            .trim_start_matches(|c: char| c.is_whitespace() || MARKER_SEPARATORS.contains(&c))
            .trim_end();
        return OptionKey::from_index(index).map(|key| (key, body));
    }
    None
}

/// 按文档顺序收集所有带序号的可点击元素；嵌套时只保留最外层
pub fn collect_option_elements<'a>(
    document: &'a Html,
    options: &ExtractOptions,
) -> Result<Vec<OptionElement<'a>>> {
    let selector = Selector::parse(&options.clickable_selector)
        .map_err(|e| anyhow!("选择器解析失败 ({}): {}", options.clickable_selector, e))?;

    let mut found = Vec::new();
    for element in document.select(&selector) {
        let text = flat_text(element);
        if let Some((key, _)) = detect_marker(&text, &options.markers) {
            found.push(OptionElement { element, key });
        }
    }

    let ids: HashSet<_> = found.iter().map(|o| o.element.id()).collect();
    found.retain(|o| !o.element.ancestors().any(|a| ids.contains(&a.id())));
    Ok(found)
}

/// 从第一个选项向上找，直到某个祖先恰好包含四个标记各一次
fn find_options_grid<'a>(
    first: ElementRef<'a>,
    candidates: &[OptionElement<'a>],
    max_ascent: usize,
) -> Option<ElementRef<'a>> {
    let mut current = element_parent(first);
    for _ in 0..max_ascent {
        let ancestor = current?;
        let mut counts = [0usize; 4];
        for candidate in candidates {
            if is_within(ancestor, candidate.element) {
                counts[candidate.key.index()] += 1;
            }
        }
        if counts == [1, 1, 1, 1] {
            return Some(ancestor);
        }
        // 已经包住了多道题，再往上只会更多
        if counts.iter().any(|&n| n > 1) {
            return None;
        }
        current = element_parent(ancestor);
    }
    None
}

/// 网格的父元素就是题目容器；如果父元素只有网格这一个子元素，再上提一层
fn container_for(grid: ElementRef<'_>) -> ElementRef<'_> {
    let Some(parent) = element_parent(grid) else {
        return grid;
    };
    if element_children(parent).count() <= 1 {
        element_parent(parent).unwrap_or(parent)
    } else {
        parent
    }
}

/// 定位页面上所有题目块，顺序与文档顺序一致
pub fn locate_blocks<'a>(candidates: &[OptionElement<'a>], max_ascent: usize) -> Vec<LocatedBlock<'a>> {
    let mut claimed = HashSet::new();
    let mut blocks = Vec::new();

    for first in candidates.iter().filter(|c| c.key == OptionKey::A) {
        let Some(grid) = find_options_grid(first.element, candidates, max_ascent) else {
            debug!("选项 {:?} 在 {} 层内没有找到完整的选项组，跳过", flat_text(first.element), max_ascent);
            continue;
        };
        let container = container_for(grid);
        if !claimed.insert(container.id()) {
            debug!("题目容器已处理过，跳过重复的选项组");
            continue;
        }
        blocks.push(LocatedBlock { container, grid });
    }

    blocks
}
