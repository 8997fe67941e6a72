use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::core::models::{OptionKey, QuestionRecord, RawExtraction};
use crate::core::types::{AnswerSource, LogEvent};
use crate::modules::answer_key::models::{AnswerKey, ApiQuestion};
use crate::utils::text::{normalize_question_text, similarity, strip_html_tags};

static IMAGE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>()\\]+?\.(?:png|jpe?g|gif|webp|svg|bmp)\b(?:\?[^\s"'<>()\\]*)?"#)
        .expect("valid image url regex")
});

/// DOM 题目与接口题目的对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlignStrategy {
    /// 第 i 道 DOM 题对第 i 道接口题
    #[default]
    Positional,
    /// 按题干相似度配对，数量一致时退回按位置
    Similarity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    pub strategy: AlignStrategy,
    pub similarity_threshold: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            strategy: AlignStrategy::Positional,
            similarity_threshold: 0.6,
        }
    }
}

/// 对账结果
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub records: Vec<QuestionRecord>,
    pub sources: Vec<AnswerSource>,
    pub events: Vec<LogEvent>,
}

/// 在文本中查找图片地址
pub fn scan_image_urls(text: &str) -> Vec<String> {
    IMAGE_URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn comparable(text: &str) -> String {
    normalize_question_text(&strip_html_tags(text)).to_lowercase()
}

/// 计算每道 DOM 题对应的接口题下标
pub fn align(
    raw: &[RawExtraction],
    key: &AnswerKey,
    options: &ReconcileOptions,
) -> (Vec<Option<usize>>, Vec<LogEvent>) {
    let mut events = Vec::new();
    let counts_match = raw.len() == key.len();
    if !counts_match {
        events.push(LogEvent::warn(format!(
            "题目数量不一致: 页面 {} 题，答案接口 {} 题",
            raw.len(),
            key.len()
        )));
    }

    match options.strategy {
        AlignStrategy::Positional => {
            let pairs = (0..raw.len()).map(|i| (i < key.len()).then_some(i)).collect();
            (pairs, events)
        }
        AlignStrategy::Similarity => {
            let api_texts: Vec<String> = key.questions.iter().map(|q| comparable(&q.question_text())).collect();
            let mut used = vec![false; key.len()];
            let mut pairs = Vec::with_capacity(raw.len());

            for (i, record) in raw.iter().enumerate() {
                let dom_text = comparable(&record.question);
                let best = api_texts
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| !used[*j])
                    .map(|(j, text)| (j, similarity(&dom_text, text)))
                    .max_by(|a, b| a.1.total_cmp(&b.1));

                let chosen = match best {
                    Some((j, score)) if score >= options.similarity_threshold => Some(j),
                    _ if counts_match && !used[i] => Some(i),
                    _ => None,
                };

                match chosen {
                    Some(j) => used[j] = true,
                    None => events.push(LogEvent::warn(format!(
                        "第 {} 题没有找到相似的接口题目，保留页面数据",
                        record.id
                    ))),
                }
                pairs.push(chosen);
            }
            (pairs, events)
        }
    }
}

fn merge_one(raw: RawExtraction, api: Option<&ApiQuestion>, subject: &str) -> (QuestionRecord, AnswerSource) {
    let mut image_urls = raw.image_urls;
    let mut explanation = raw.explanation;
    let mut api_answer = None;

    if let Some(api) = api {
        for text in api.searchable_texts() {
            for url in scan_image_urls(&text) {
                if !image_urls.contains(&url) {
                    image_urls.push(url);
                }
            }
        }
        if explanation.trim().is_empty() {
            explanation = api.explanation().unwrap_or_default();
        }
        api_answer = api.answer_key();
    }

    let (correct_answer, source) = match (api_answer, raw.dom_answer) {
        (Some(api_key), dom) => {
            if let Some(dom_key) = dom.filter(|d| *d != api_key) {
                debug!("第 {} 题页面标记 {} 与接口答案 {} 不一致，以接口为准", raw.id, dom_key, api_key);
            }
            (Some(api_key), AnswerSource::Api)
        }
        (None, Some(dom_key)) => (Some(dom_key), AnswerSource::Dom),
        (None, None) => (None::<OptionKey>, AnswerSource::Missing),
    };

    let mut record = QuestionRecord {
        id: raw.id,
        subject: subject.to_string(),
        question: raw.question,
        options: raw.options,
        correct_answer,
        explanation,
        has_diagram: false,
        image: None,
        local_image: None,
        images: Vec::new(),
        original_image_url: image_urls.first().cloned(),
        original_image_urls: image_urls,
        svg_code: raw.svg_code,
        topic: String::new(),
    };
    record.refresh_has_diagram();
    (record, source)
}

/// 把接口答案合并进 DOM 提取结果；`key` 为 None 时只用页面数据
pub fn reconcile(
    raw: Vec<RawExtraction>,
    key: Option<&AnswerKey>,
    subject: &str,
    options: &ReconcileOptions,
) -> Reconciled {
    let (pairs, mut events) = match key {
        Some(key) => align(&raw, key, options),
        None => (vec![None; raw.len()], Vec::new()),
    };

    let mut records = Vec::with_capacity(raw.len());
    let mut sources = Vec::with_capacity(raw.len());
    for (item, pair) in raw.into_iter().zip(pairs) {
        let api = key.zip(pair).and_then(|(k, j)| k.questions.get(j));
        let (record, source) = merge_one(item, api, subject);
        records.push(record);
        sources.push(source);
    }

    let from_api = sources.iter().filter(|s| **s == AnswerSource::Api).count();
    events.push(LogEvent::info(format!(
        "对账完成: {} 题，其中 {} 题答案来自接口",
        records.len(),
        from_api
    )));

    Reconciled {
        records,
        sources,
        events,
    }
}
