use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// 题号后面允许出现的分隔符：英文句点、孟加拉语句号（।）、右括号、冒号
const ORDINAL_SEPARATORS: [char; 4] = ['.', '।', ')', ':'];

/// 清理文件名中的非法字符
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// 生成 JSON 文件名：先去掉已有的 .json 后缀（不区分大小写）再统一补上
pub fn json_filename(raw: &str) -> String {
    let cleaned = sanitize_filename(raw);
    let stem = match cleaned.len().checked_sub(5) {
        Some(split)
            if cleaned.is_char_boundary(split)
                && cleaned[split..].eq_ignore_ascii_case(".json") =>
        {
            &cleaned[..split]
        }
        _ => cleaned.as_str(),
    };
    let stem = stem.trim();
    if stem.is_empty() {
        "questions.json".to_string()
    } else {
        format!("{}.json", stem)
    }
}

/// 合并连续空白为单个空格并去掉首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_ordinal_digit(c: char) -> bool {
    c.is_ascii_digit() || ('০'..='৯').contains(&c)
}

/// 去掉开头的题号（"1."、"১।"、"3)" 等），重复出现时全部去掉。
/// 题号后紧跟数字（如 "2.5"）时视为正文，不做处理。
pub fn strip_leading_ordinal(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        let digits_end = rest
            .char_indices()
            .find(|(_, c)| !is_ordinal_digit(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if digits_end == 0 {
            break;
        }
        let after = rest[digits_end..].trim_start();
        let mut chars = after.chars();
        match chars.next() {
            Some(sep) if ORDINAL_SEPARATORS.contains(&sep) => {
                let tail = chars.as_str();
                if tail.chars().next().is_some_and(is_ordinal_digit) {
                    break;
                }
                rest = tail.trim_start();
            }
            _ => break,
        }
    }
    rest
}

/// 题干规范化：去题号 + 合并空白。对已规范化的文本再次调用结果不变
pub fn normalize_question_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    collapse_whitespace(strip_leading_ordinal(&collapsed))
}

/// 去掉 HTML 标签，仅用于比较文本相似度
pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG_RE.replace_all(text, " ").into_owned()
}

/// 基于编辑距离的归一化相似度，取值 0.0 ~ 1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    1.0 - prev[b.len()] as f64 / longest as f64
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
