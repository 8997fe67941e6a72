use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::core::models::{OptionKey, OptionMap, RawExtraction};
use crate::core::types::LogEvent;
use crate::extract::ExtractOptions;
use crate::extract::dom::{element_children, flat_text, is_within, meaningful_lines, visible_text};
use crate::extract::locator::{LocatedBlock, OptionElement, detect_marker};
use crate::extract::signal::{RENDERED_HEIGHT_ATTR, RENDERED_WIDTH_ATTR, VisualSignal};
use crate::utils::text::{collapse_whitespace, normalize_question_text, truncate_text};

/// 分数增减标注，如 "-0.5/1"；必须是元素的全部文本
static SCORE_DELTA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-−]\s*\d+(?:\.\d+)?\s*/\s*\d+(?:\.\d+)?$").expect("valid score regex")
});

/// 快照脚本留在元素上的标注属性
static ANNOTATION_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+data-scrape-(?:bg|w|h)="[^"]*""#).expect("valid annotation regex"));

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid img selector"));
static SVG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("svg").expect("valid svg selector"));

/// 广告/标签块的 class 特征
const TAG_CLASS_MARKERS: &[&str] = &["sponsor", "advert", "promo", "badge", "ad-banner"];

/// 按文本判断标签块时只看短文本，避免误伤题干
const TAG_TEXT_MAX_CHARS: usize = 40;

/// 追踪像素、社交组件所在的域名
static TRACKING_DOMAINS: phf::Set<&'static str> = phf::phf_set! {
    "facebook.com",
    "facebook.net",
    "fbcdn.net",
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
    "googlesyndication.com",
    "twitter.com",
    "twimg.com",
    "linkedin.com",
    "pinterest.com",
    "scorecardresearch.com",
    "pixel.wp.com",
    "whatsapp.com",
};

/// 页面里同一道题需要排除在题干之外的子块
struct Exclusions<'a> {
    grid: ElementRef<'a>,
    noise: Vec<ElementRef<'a>>,
    explanation: Option<ElementRef<'a>>,
}

fn is_tag_noise(element: ElementRef<'_>, options: &ExtractOptions) -> bool {
    let text = flat_text(element);
    if text.is_empty() || text.chars().count() > TAG_TEXT_MAX_CHARS {
        return false;
    }
    let class_hit = element.value().classes().any(|class| {
        let lowered = class.to_ascii_lowercase();
        TAG_CLASS_MARKERS.iter().any(|m| lowered.contains(m))
    });
    if class_hit || SCORE_DELTA_RE.is_match(&text) {
        return true;
    }
    let lowered = text.to_lowercase();
    let bare = lowered.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    options
        .tag_tokens
        .iter()
        .any(|token| !token.is_empty() && bare == token.to_lowercase())
}

/// 解析框只看容器的直接子元素；标签块在整个容器里找，只排除最内层的那个
fn classify_children<'a>(
    block: &LocatedBlock<'a>,
    options: &ExtractOptions,
    signal: &dyn VisualSignal,
) -> Exclusions<'a> {
    let mut noise = Vec::new();
    let mut explanation = None;
    for child in element_children(block.container) {
        if is_within(child, block.grid) {
            continue;
        }
        if signal.is_explanation(child) {
            if explanation.is_none() {
                explanation = Some(child);
            }
            noise.push(child);
        }
    }

    let tags: Vec<ElementRef<'a>> = block
        .container
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| !is_within(*el, block.grid) && !is_within(block.grid, *el))
        .filter(|el| !noise.iter().any(|n| is_within(*n, *el)))
        .filter(|el| is_tag_noise(*el, options))
        .collect();
    for tag in &tags {
        // 外层还包着别的内容，只去掉里面的标签
        if tags.iter().any(|inner| inner.id() != tag.id() && is_within(*tag, *inner)) {
            continue;
        }
        noise.push(*tag);
    }

    Exclusions {
        grid: block.grid,
        noise,
        explanation,
    }
}

fn question_text(block: &LocatedBlock<'_>, exclusions: &Exclusions<'_>) -> String {
    let skip = |el: ElementRef<'_>| {
        el.id() == exclusions.grid.id() || exclusions.noise.iter().any(|n| n.id() == el.id())
    };
    let raw = visible_text(block.container, &skip);
    normalize_question_text(&meaningful_lines(&raw))
}

fn extract_options(
    block: &LocatedBlock<'_>,
    candidates: &[OptionElement<'_>],
    options: &ExtractOptions,
    signal: &dyn VisualSignal,
    events: &mut Vec<LogEvent>,
    id: usize,
) -> (OptionMap, Option<OptionKey>) {
    let mut map = OptionMap::new();
    let mut marked = Vec::new();
    for candidate in candidates.iter().filter(|c| is_within(block.grid, c.element)) {
        if map.contains_key(&candidate.key) {
            continue;
        }
        let text = flat_text(candidate.element);
        let body = detect_marker(&text, &options.markers)
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        map.insert(candidate.key, body);
        if signal.is_correct(candidate.element) {
            marked.push(candidate.key);
        }
    }
    if marked.len() > 1 {
        events.push(LogEvent::warn(format!(
            "第 {} 题有 {} 个选项同时被标记为正确，取第一个 ({})",
            id,
            marked.len(),
            marked[0]
        )));
    }
    (map, marked.first().copied())
}

fn is_tracking_url(url: &str) -> bool {
    let host = match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(str::to_ascii_lowercase),
        Err(_) => None,
    };
    match host {
        Some(host) => TRACKING_DOMAINS
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain))),
        None => TRACKING_DOMAINS.iter().any(|domain| url.contains(*domain)),
    }
}

fn resolve_url(raw: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base.join(raw).map(String::from).unwrap_or_else(|_| raw.to_string()),
        None => raw.to_string(),
    }
}

fn extract_image_urls(
    container: ElementRef<'_>,
    base: Option<&Url>,
    options: &ExtractOptions,
) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for img in container.select(&IMG_SELECTOR) {
        for attr in ["src", "data-src"] {
            let Some(raw) = img.value().attr(attr).map(str::trim) else {
                continue;
            };
            if raw.starts_with("data:") || raw.chars().count() <= options.min_image_url_len {
                continue;
            }
            let resolved = resolve_url(raw, base);
            if is_tracking_url(&resolved) || urls.contains(&resolved) {
                continue;
            }
            urls.push(resolved);
        }
    }
    urls
}

fn dimension(svg: ElementRef<'_>, rendered_attr: &str, plain_attr: &str) -> f64 {
    svg.value()
        .attr(rendered_attr)
        .or_else(|| svg.value().attr(plain_attr))
        .and_then(|raw| raw.trim().trim_end_matches("px").parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn extract_svg(container: ElementRef<'_>, options: &ExtractOptions) -> Option<String> {
    container
        .select(&SVG_SELECTOR)
        .find(|svg| {
            dimension(*svg, RENDERED_WIDTH_ATTR, "width") >= options.min_svg_size
                && dimension(*svg, RENDERED_HEIGHT_ATTR, "height") >= options.min_svg_size
        })
        .map(|svg| ANNOTATION_ATTR_RE.replace_all(&svg.html(), "").into_owned())
}

/// 从一个已定位的题目块中提取题干、选项、答案、解析和图片
pub fn extract_block(
    block: &LocatedBlock<'_>,
    candidates: &[OptionElement<'_>],
    id: usize,
    base: Option<&Url>,
    options: &ExtractOptions,
    signal: &dyn VisualSignal,
    events: &mut Vec<LogEvent>,
) -> RawExtraction {
    let exclusions = classify_children(block, options, signal);
    let question = question_text(block, &exclusions);
    if question.is_empty() {
        events.push(LogEvent::warn(format!("第 {} 题未提取到题干文本", id)));
    }

    let (option_map, dom_answer) = extract_options(block, candidates, options, signal, events, id);

    let explanation = exclusions
        .explanation
        .map(|el| collapse_whitespace(&visible_text(el, &|_: ElementRef<'_>| false)))
        .unwrap_or_default();

    let image_urls = extract_image_urls(block.container, base, options);
    let svg_code = extract_svg(block.container, options);

    debug!(
        "第 {} 题: {} | 答案 {:?} | 图片 {} 张 | svg {}",
        id,
        truncate_text(&question, 30),
        dom_answer,
        image_urls.len(),
        svg_code.is_some()
    );

    RawExtraction {
        id,
        question,
        options: option_map,
        dom_answer,
        explanation,
        image_urls,
        svg_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::locator::{collect_option_elements, locate_blocks};
    use crate::extract::signal::ColorSignal;
    use scraper::Html;

    fn extract_single(html: &str) -> (RawExtraction, Vec<LogEvent>) {
        let doc = Html::parse_document(html);
        let options = ExtractOptions::default();
        let candidates = collect_option_elements(&doc, &options).unwrap();
        let blocks = locate_blocks(&candidates, options.max_ascent);
        assert_eq!(blocks.len(), 1);
        let base = Url::parse("https://exams.example.com/exam/42").ok();
        let mut events = Vec::new();
        let raw = extract_block(&blocks[0], &candidates, 1, base.as_ref(), &options, &ColorSignal, &mut events);
        (raw, events)
    }

    #[test]
    fn question_text_excludes_options_explanation_and_tags() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <div class="title">৫। নিচের কোনটি   মৌলিক রাশি?</div>
                <span class="badge">-0.5/1</span>
                <div class="grid">
                  <button>ক. ভর</button><button>খ. বল</button>
                  <button style="background-color: rgb(40, 167, 69)">গ. কাজ</button><button>ঘ. শক্তি</button>
                </div>
                <div data-scrape-bg="rgb(212, 237, 218)">ব্যাখ্যা: ভর একটি মৌলিক রাশি</div>
            </div></body></html>"#,
        );
        assert_eq!(raw.question, "নিচের কোনটি মৌলিক রাশি?");
        assert_eq!(raw.options.len(), 4);
        assert_eq!(raw.options[&OptionKey::A], "ভর");
        assert_eq!(raw.options[&OptionKey::D], "শক্তি");
        assert_eq!(raw.dom_answer, Some(OptionKey::C));
        assert_eq!(raw.explanation, "ব্যাখ্যা: ভর একটি মৌলিক রাশি");
    }

    #[test]
    fn fraction_in_stem_is_kept() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <p>1. 3-1/2 এর মান কত?</p>
                <div class="grid">
                  <button>ক. 2.5</button><button>খ. 1.5</button><button>গ. 3.5</button><button>ঘ. 2</button>
                </div>
            </div></body></html>"#,
        );
        assert_eq!(raw.question, "3-1/2 এর মান কত?");
    }

    #[test]
    fn score_badge_inside_stem_wrapper_is_dropped() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <div class="head"><p>1. নিচের কোনটি মৌলিক রাশি?</p><span class="badge">-0.5/1</span></div>
                <div class="grid">
                  <button>ক. ভর</button><button>খ. বল</button><button>গ. কাজ</button><button>ঘ. শক্তি</button>
                </div>
            </div></body></html>"#,
        );
        assert_eq!(raw.question, "নিচের কোনটি মৌলিক রাশি?");
    }

    #[test]
    fn tag_wrapper_keeps_stem_and_drops_only_the_tag() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <div class="promo-row"><p>2. Boiling point?</p><span>Sponsored</span></div>
                <div class="grid">
                  <button>ক. 90</button><button>খ. 100</button><button>গ. 110</button><button>ঘ. 120</button>
                </div>
            </div></body></html>"#,
        );
        assert_eq!(raw.question, "Boiling point?");
    }

    #[test]
    fn stem_mentioning_a_tag_word_is_kept() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <p>3. What does sponsored mean?</p>
                <div class="grid">
                  <button>ক. a</button><button>খ. b</button><button>গ. c</button><button>ঘ. d</button>
                </div>
            </div></body></html>"#,
        );
        assert_eq!(raw.question, "What does sponsored mean?");
    }

    #[test]
    fn images_are_filtered_resolved_and_deduplicated() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <p>1. Look at the figure carefully</p>
                <img src="/uploads/fig-1.png">
                <img src="/uploads/fig-1.png">
                <img src="data:image/png;base64,AAAA">
                <img src="https://www.facebook.com/tr?id=1&ev=PageView">
                <img src="a.png">
                <img src="https://cdn.example.com/placeholder.gif" data-src="https://cdn.example.com/real.jpg">
                <div class="grid"><button>ক 1</button><button>খ 2</button><button>গ 3</button><button>ঘ 4</button></div>
            </div></body></html>"#,
        );
        assert_eq!(
            raw.image_urls,
            vec![
                "https://exams.example.com/uploads/fig-1.png".to_string(),
                "https://cdn.example.com/placeholder.gif".to_string(),
                "https://cdn.example.com/real.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn small_svg_icons_are_ignored() {
        let (raw, _) = extract_single(
            r#"<html><body><div class="q">
                <p>1. Which circuit is shown?</p>
                <svg data-scrape-w="16" data-scrape-h="16"><path d="M0 0"/></svg>
                <svg data-scrape-w="240" data-scrape-h="120"><circle r="4"/></svg>
                <div class="grid"><button>ক 1</button><button>খ 2</button><button>গ 3</button><button>ঘ 4</button></div>
            </div></body></html>"#,
        );
        let svg = raw.svg_code.expect("diagram svg kept");
        assert!(svg.contains("circle"));
        assert!(!svg.contains("data-scrape"));
    }

    #[test]
    fn missing_text_is_reported_not_fatal() {
        let (raw, events) = extract_single(
            r#"<html><body><div class="q"><span>x</span>
                <div class="grid"><button>ক 1</button><button>খ 2</button><button>গ 3</button><button>ঘ 4</button></div>
            </div></body></html>"#,
        );
        assert!(raw.question.is_empty());
        assert_eq!(raw.options.len(), 4);
        assert!(events.iter().any(|e| e.message.contains("题干")));
    }
}
