use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::models::{AssetBundle, QuestionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmitTarget {
    /// 提交给本地考试应用的保存接口
    #[default]
    Endpoint,
    /// 直接写 JSON 文件
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    pub target: EmitTarget,
    pub host: String,
    /// 按顺序探测的端口
    pub ports: Vec<u16>,
    pub save_path: String,
    pub probe_timeout_ms: u64,
    /// 提交失败时写备份文件的目录
    pub fallback_dir: String,
    /// file 模式下的输出路径
    pub output: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            target: EmitTarget::Endpoint,
            host: "localhost".to_string(),
            ports: vec![3000, 3001, 5173, 8080],
            save_path: "/api/save-questions".to_string(),
            probe_timeout_ms: 800,
            fallback_dir: ".".to_string(),
            output: None,
        }
    }
}

impl EmitOptions {
    fn save_url(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, self.save_path)
    }
}

/// 保存接口的请求体
#[derive(Debug, Serialize)]
pub struct SavePayload<'a> {
    pub filename: &'a str,
    pub questions: &'a [QuestionRecord],
    pub images: &'a AssetBundle,
}

/// 保存接口的响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub file: Option<String>,
    pub images_saved: Vec<String>,
    pub message: Option<String>,
}

/// 数据最终去了哪里
#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    Saved {
        endpoint: String,
        file: Option<String>,
        images_saved: usize,
    },
    FallbackWritten(PathBuf),
    Written(PathBuf),
}

impl fmt::Display for EmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitOutcome::Saved {
                endpoint,
                file,
                images_saved,
            } => write!(
                f,
                "已提交到 {}，文件 {}，图片 {} 张",
                endpoint,
                file.as_deref().unwrap_or("-"),
                images_saved
            ),
            EmitOutcome::FallbackWritten(path) => write!(f, "保存接口不可用，已写入备份文件 {}", path.display()),
            EmitOutcome::Written(path) => write!(f, "已写入 {}", path.display()),
        }
    }
}

/// 依次用 OPTIONS 探测端口，第一个返回 <500 的胜出；都不通就用第一个
pub async fn probe_endpoint(client: &reqwest::Client, options: &EmitOptions) -> Result<String> {
    let timeout = Duration::from_millis(options.probe_timeout_ms);
    for port in &options.ports {
        let url = options.save_url(*port);
        match client.request(Method::OPTIONS, &url).timeout(timeout).send().await {
            Ok(resp) if resp.status().as_u16() < 500 => {
                debug!("🔌 端口 {} 可用 ({})", port, resp.status());
                return Ok(url);
            }
            Ok(resp) => debug!("端口 {} 返回 {}", port, resp.status()),
            Err(e) => debug!("端口 {} 探测失败: {}", port, e),
        }
    }
    let first = options.ports.first().ok_or_else(|| anyhow!("没有配置保存接口端口"))?;
    Ok(options.save_url(*first))
}

pub async fn post_questions(client: &reqwest::Client, url: &str, payload: &SavePayload<'_>) -> Result<SaveResponse> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .with_context(|| format!("提交题目失败: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("保存接口返回 HTTP {}", status));
    }
    let body: SaveResponse = response.json().await.context("保存接口响应解析失败")?;
    if !body.success {
        return Err(anyhow!(
            "保存接口返回失败: {}",
            body.message.as_deref().unwrap_or("未知原因")
        ));
    }
    Ok(body)
}

/// 把题目数组以格式化 JSON 写入文件
pub fn write_json_file(path: &Path, records: &[QuestionRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(records)?;
    fs::write(path, content).with_context(|| format!("写入文件失败: {}", path.display()))?;
    Ok(())
}

/// 输出题目；只有备份文件也写不了时才返回错误
pub async fn emit(
    client: &reqwest::Client,
    records: &[QuestionRecord],
    bundle: &AssetBundle,
    filename: &str,
    options: &EmitOptions,
) -> Result<EmitOutcome> {
    if options.target == EmitTarget::File {
        let path = options
            .output
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&options.fallback_dir).join(filename));
        write_json_file(&path, records)?;
        info!("💾 已写入 {} 道题: {}", records.len(), path.display());
        return Ok(EmitOutcome::Written(path));
    }

    let handoff = async {
        let url = probe_endpoint(client, options).await?;
        info!("📤 正在提交 {} 道题、{} 张图片到 {}", records.len(), bundle.len(), url);
        let payload = SavePayload {
            filename,
            questions: records,
            images: bundle,
        };
        let response = post_questions(client, &url, &payload).await?;
        Ok::<_, anyhow::Error>((url, response))
    }
    .await;

    match handoff {
        Ok((endpoint, response)) => {
            info!(
                "✅ 保存成功: {}，图片 {} 张",
                response.file.as_deref().unwrap_or(filename),
                response.images_saved.len()
            );
            Ok(EmitOutcome::Saved {
                endpoint,
                file: response.file,
                images_saved: response.images_saved.len(),
            })
        }
        Err(e) => {
            warn!("⚠️ 提交失败，改为写本地文件: {:#}", e);
            let path = Path::new(&options.fallback_dir).join(filename);
            write_json_file(&path, records)?;
            info!("💾 备份文件已写入: {}", path.display());
            Ok(EmitOutcome::FallbackWritten(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_response_tolerates_missing_fields() {
        let resp: SaveResponse = serde_json::from_str(r#"{"success":true,"file":"x.json","imagesSaved":["q1_img1.png","q2_img1.png"]}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.images_saved.len(), 2);
        let resp: SaveResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.success);
    }

    #[test]
    fn payload_uses_expected_keys() {
        let bundle = AssetBundle::default();
        let payload = SavePayload {
            filename: "a.json",
            questions: &[],
            images: &bundle,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["filename"], "a.json");
        assert!(value["questions"].is_array());
        assert!(value["images"].is_object());
    }

    #[tokio::test]
    async fn probe_falls_back_to_first_port() {
        let options = EmitOptions {
            host: "127.0.0.1".to_string(),
            ports: vec![1, 2],
            probe_timeout_ms: 200,
            ..Default::default()
        };
        let url = probe_endpoint(&reqwest::Client::new(), &options).await.unwrap();
        assert_eq!(url, "http://127.0.0.1:1/api/save-questions");
    }

    #[tokio::test]
    async fn closed_ports_write_fallback_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = EmitOptions {
            host: "127.0.0.1".to_string(),
            ports: vec![1],
            probe_timeout_ms: 200,
            fallback_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let outcome = emit(&reqwest::Client::new(), &[], &AssetBundle::default(), "out.json", &options)
            .await
            .unwrap();
        let expected = dir.path().join("out.json");
        assert_eq!(outcome, EmitOutcome::FallbackWritten(expected.clone()));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "[]");
    }
}
