use scraper::ElementRef;

/// 按 innerText 的习惯，这些元素前后换行
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

/// 不可见或不属于正文的元素
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head", "title"];

pub fn element_parent(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

pub fn element_children<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element.children().filter_map(ElementRef::wrap)
}

/// `node` 是否位于 `ancestor` 子树内（含自身）
pub fn is_within(ancestor: ElementRef<'_>, node: ElementRef<'_>) -> bool {
    node.id() == ancestor.id() || node.ancestors().any(|a| a.id() == ancestor.id())
}

/// 提取可见文本，块级元素之间插入换行；`skip` 返回 true 的子树整个跳过
pub fn visible_text<F>(root: ElementRef<'_>, skip: &F) -> String
where
    F: Fn(ElementRef<'_>) -> bool,
{
    let mut out = String::new();
    collect_text(root, skip, &mut out);
    out
}

fn collect_text<F>(element: ElementRef<'_>, skip: &F, out: &mut String)
where
    F: Fn(ElementRef<'_>) -> bool,
{
    let name = element.value().name();
    if SKIP_TAGS.contains(&name) || skip(element) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, skip, out);
        }
    }
    if block {
        out.push('\n');
    }
}

/// 按行切分，去掉长度不超过 2 个字符的噪声行
pub fn meaningful_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > 2)
        .collect::<Vec<_>>()
        .join("\n")
}

/// 元素文本（合并空白），用于判断选项序号
pub fn flat_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn visible_text_breaks_lines_on_blocks_and_skips_scripts() {
        let doc = Html::parse_fragment(
            r#"<div id="root"><p>First line</p>inline <b>bold</b><br>after<script>var x;</script><div class="skip">hidden</div></div>"#,
        );
        let root = doc.select(&Selector::parse("#root").unwrap()).next().unwrap();
        let text = visible_text(root, &|el: ElementRef<'_>| el.value().classes().any(|c| c == "skip"));
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["First line", "inline bold", "after"]);
    }

    #[test]
    fn meaningful_lines_drops_short_noise() {
        assert_eq!(meaningful_lines("ab\n  real text \n1.\nxyz"), "real text\nxyz");
    }
}
