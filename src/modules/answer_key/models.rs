use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::models::OptionKey;

/// 答案接口里的一道题，字段都可能缺失或类型不对
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiQuestion {
    pub question: Value,
    #[serde(rename = "A")]
    pub a: Value,
    #[serde(rename = "B")]
    pub b: Value,
    #[serde(rename = "C")]
    pub c: Value,
    #[serde(rename = "D")]
    pub d: Value,
    pub solution: Value,
    pub answer: Value,
    pub meta: Value,
}

/// 把任意 JSON 值转成可搜索的文本
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ApiQuestion {
    pub fn question_text(&self) -> String {
        value_text(&self.question)
    }

    /// 接口声明的答案字母，统一成小写 a-d
    pub fn answer_key(&self) -> Option<OptionKey> {
        self.answer.as_str().and_then(OptionKey::from_letter)
    }

    /// 解析：纯字符串，或带 explanation 字段的对象
    pub fn explanation(&self) -> Option<String> {
        let text = match &self.solution {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("explanation").and_then(Value::as_str),
            _ => None,
        }?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// 需要扫描图片地址的所有文本字段
    pub fn searchable_texts(&self) -> Vec<String> {
        [
            &self.question,
            &self.a,
            &self.b,
            &self.c,
            &self.d,
            &self.solution,
            &self.meta,
        ]
        .into_iter()
        .map(value_text)
        .filter(|text| !text.is_empty())
        .collect()
    }
}

/// 一场考试的标准答案
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    pub questions: Vec<ApiQuestion>,
}

impl AnswerKey {
    /// 从 `{ data: { exam: { questions: [{ q: {...} }] } } }` 中取题目。
    /// 结构不对就当作没有答案；单条坏数据用空记录占位，保证位置对齐。
    pub fn from_response(value: &Value) -> Self {
        let Some(entries) = value
            .get("data")
            .and_then(|d| d.get("exam"))
            .and_then(|e| e.get("questions"))
            .and_then(Value::as_array)
        else {
            debug!("答案接口返回结构不完整，按 0 题处理");
            return Self::default();
        };

        let questions = entries
            .iter()
            .map(|entry| {
                entry
                    .get("q")
                    .cloned()
                    .and_then(|q| serde_json::from_value::<ApiQuestion>(q).ok())
                    .unwrap_or_default()
            })
            .collect();
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
