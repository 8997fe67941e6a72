use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use crate::modules::answer_key::models::AnswerKey;

/// 从页面地址推出来的考试标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamLocator {
    pub exam_id: String,
    /// 页面自身带了 teacher=true 时才转发
    pub teacher: bool,
}

/// 考试 id 取页面路径的最后一段；teacher 模式看页面 query
pub fn locate_exam(page_url: &str) -> Option<ExamLocator> {
    let url = Url::parse(page_url).ok()?;
    let last = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let exam_id = urlencoding::decode(last).ok()?.into_owned();
    if exam_id.trim().is_empty() {
        return None;
    }
    let teacher = url.query_pairs().any(|(k, v)| k == "teacher" && v == "true");
    Some(ExamLocator { exam_id, teacher })
}

/// 答案接口客户端
#[derive(Debug, Clone)]
pub struct AnswerKeyClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnswerKeyClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self, locator: &ExamLocator) -> String {
        let mut url = format!(
            "{}/exam/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&locator.exam_id)
        );
        if locator.teacher {
            url.push_str("?teacher=true");
        }
        url
    }

    /// 拉取标准答案；网络错误、非 2xx、非 JSON 都作为错误返回，由调用方降级处理
    pub async fn fetch(&self, locator: &ExamLocator) -> Result<AnswerKey> {
        let endpoint = self.endpoint(locator);
        info!("🔑 正在获取标准答案: {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .header("Accept", "application/json, text/plain, */*")
            .send()
            .await
            .with_context(|| format!("答案接口请求失败: {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("答案接口返回 HTTP {}: {}", status, endpoint));
        }

        let body: Value = response.json().await.context("答案接口返回的不是合法 JSON")?;
        let key = AnswerKey::from_response(&body);
        debug!("答案接口返回 {} 题", key.len());
        Ok(key)
    }
}
