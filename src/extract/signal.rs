//! 视觉信号判定：哪个选项被标成了正确答案、哪个块是解析框。
//!
//! 页面主题一变颜色就会变，所以判定逻辑全部放在 [`VisualSignal`] 后面，
//! 提取流程只认这个 trait。

use scraper::ElementRef;
use serde::Deserialize;

/// 快照脚本写入的计算背景色属性
pub const COMPUTED_BG_ATTR: &str = "data-scrape-bg";
/// 快照脚本写入的渲染宽度（px）
pub const RENDERED_WIDTH_ATTR: &str = "data-scrape-w";
/// 快照脚本写入的渲染高度（px）
pub const RENDERED_HEIGHT_ATTR: &str = "data-scrape-h";

/// 常见主题里“正确/成功”按钮的绿色
const CORRECT_RGB: &[&str] = &[
    "40,167,69",
    "25,135,84",
    "76,175,80",
    "34,197,94",
    "22,163,74",
    "16,185,129",
    "46,204,113",
    "0,128,0",
];

/// 解析框使用的浅绿/浅青底色
const HIGHLIGHT_RGB: &[&str] = &[
    "212,237,218",
    "209,231,221",
    "220,252,231",
    "240,253,244",
    "209,250,229",
    "204,251,241",
    "240,253,250",
    "232,245,233",
    "224,242,241",
];

const CORRECT_CLASS_TOKENS: &[&str] = &[
    "correct",
    "is-correct",
    "correct-answer",
    "answer-correct",
    "right-answer",
    "success",
    "bg-success",
    "btn-success",
];

const EXPLANATION_CLASS_MARKERS: &[&str] = &["explanation", "explain", "solution"];

pub trait VisualSignal {
    /// 选项元素是否被标记为正确答案
    fn is_correct(&self, option: ElementRef<'_>) -> bool;
    /// 元素是否是解析框
    fn is_explanation(&self, element: ElementRef<'_>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    #[default]
    Color,
    Attribute,
    Both,
}

pub fn build_signal(kind: SignalKind) -> Box<dyn VisualSignal + Send + Sync> {
    match kind {
        SignalKind::Color => Box::new(ColorSignal),
        SignalKind::Attribute => Box::new(AttributeSignal),
        SignalKind::Both => Box::new(EitherSignal(ColorSignal, AttributeSignal)),
    }
}

/// 内联 style 里 background / background-color 的值，其它声明（如文字颜色）不算
fn inline_background(style: &str) -> Option<&str> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(name, _)| {
            let name = name.trim();
            name.eq_ignore_ascii_case("background-color") || name.eq_ignore_ascii_case("background")
        })
        .map(|(_, value)| value)
        .last()
}

/// 去掉空白后的背景色，快照属性优先，没有则退回内联 style
fn background_of(element: ElementRef<'_>) -> String {
    let raw = element
        .value()
        .attr(COMPUTED_BG_ATTR)
        .or_else(|| element.value().attr("style").and_then(inline_background))
        .unwrap_or("");
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn matches_rgb(background: &str, palette: &[&str]) -> bool {
    palette.iter().any(|rgb| {
        background
            .match_indices(rgb)
            .any(|(i, _)| i == 0 || !background[..i].ends_with(|c: char| c.is_ascii_digit()))
    })
}

fn has_class_token(element: ElementRef<'_>, tokens: &[&str]) -> bool {
    element
        .value()
        .classes()
        .any(|class| tokens.iter().any(|t| class.eq_ignore_ascii_case(t)))
}

fn class_contains(element: ElementRef<'_>, markers: &[&str]) -> bool {
    element.value().classes().any(|class| {
        let lowered = class.to_ascii_lowercase();
        markers.iter().any(|m| lowered.contains(m))
    })
}

/// 按背景色 + class 判定
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorSignal;

impl VisualSignal for ColorSignal {
    fn is_correct(&self, option: ElementRef<'_>) -> bool {
        matches_rgb(&background_of(option), CORRECT_RGB) || has_class_token(option, CORRECT_CLASS_TOKENS)
    }

    fn is_explanation(&self, element: ElementRef<'_>) -> bool {
        matches_rgb(&background_of(element), HIGHLIGHT_RGB)
            || class_contains(element, EXPLANATION_CLASS_MARKERS)
    }
}

/// 按显式属性判定（data-* / ARIA 状态）
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeSignal;

impl VisualSignal for AttributeSignal {
    fn is_correct(&self, option: ElementRef<'_>) -> bool {
        let el = option.value();
        el.attr("data-correct") == Some("true")
            || el.attr("aria-checked") == Some("true")
            || el.attr("aria-pressed") == Some("true")
            || el.attr("data-state") == Some("correct")
    }

    fn is_explanation(&self, element: ElementRef<'_>) -> bool {
        let el = element.value();
        el.attr("data-role") == Some("explanation")
            || el.attr("role") == Some("note")
            || class_contains(element, EXPLANATION_CLASS_MARKERS)
    }
}

/// 任一信号命中即可
#[derive(Debug, Clone, Copy, Default)]
pub struct EitherSignal<A, B>(pub A, pub B);

impl<A: VisualSignal, B: VisualSignal> VisualSignal for EitherSignal<A, B> {
    fn is_correct(&self, option: ElementRef<'_>) -> bool {
        self.0.is_correct(option) || self.1.is_correct(option)
    }

    fn is_explanation(&self, element: ElementRef<'_>) -> bool {
        self.0.is_explanation(element) || self.1.is_explanation(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let selector = Selector::parse(css).unwrap();
        doc.select(&selector).next().unwrap()
    }

    #[test]
    fn color_signal_matches_rgb_and_rgba_forms() {
        let doc = Html::parse_fragment(
            r#"<button id="x" data-scrape-bg="rgba(40, 167, 69, 0.9)">ক</button>
               <button id="y" style="background-color: rgb(25,135,84)">খ</button>
               <button id="z" data-scrape-bg="rgb(140, 167, 69)">গ</button>"#,
        );
        assert!(ColorSignal.is_correct(first(&doc, "#x")));
        assert!(ColorSignal.is_correct(first(&doc, "#y")));
        assert!(!ColorSignal.is_correct(first(&doc, "#z")));
    }

    #[test]
    fn text_colour_is_not_a_background() {
        let doc = Html::parse_fragment(
            r#"<button id="c" style="color: rgb(40, 167, 69)">ক</button>
               <button id="b" style="border: 1px solid rgb(40,167,69); background: rgb(255,255,255)">খ</button>
               <button id="s" style="COLOR:#000;Background-Color: rgb(40, 167, 69)">গ</button>"#,
        );
        assert!(!ColorSignal.is_correct(first(&doc, "#c")));
        assert!(!ColorSignal.is_correct(first(&doc, "#b")));
        assert!(ColorSignal.is_correct(first(&doc, "#s")));
    }

    #[test]
    fn incorrect_class_is_not_correct() {
        let doc = Html::parse_fragment(
            r#"<button id="bad" class="option incorrect">ক</button><button id="ok" class="option Correct">খ</button>"#,
        );
        assert!(!ColorSignal.is_correct(first(&doc, "#bad")));
        assert!(ColorSignal.is_correct(first(&doc, "#ok")));
    }

    #[test]
    fn highlight_tint_is_explanation_not_correct() {
        let doc = Html::parse_fragment(r#"<div id="e" data-scrape-bg="rgb(212, 237, 218)">why</div>"#);
        let el = first(&doc, "#e");
        assert!(ColorSignal.is_explanation(el));
        assert!(!ColorSignal.is_correct(el));
    }

    #[test]
    fn attribute_signal_reads_aria_state() {
        let doc = Html::parse_fragment(
            r#"<div role="button" id="a" aria-pressed="true">ক</div><div id="n" role="note">x</div>"#,
        );
        assert!(AttributeSignal.is_correct(first(&doc, "#a")));
        assert!(AttributeSignal.is_explanation(first(&doc, "#n")));
        assert!(!ColorSignal.is_correct(first(&doc, "#a")));
        let both = build_signal(SignalKind::Both);
        assert!(both.is_correct(first(&doc, "#a")));
    }
}
