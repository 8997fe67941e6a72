use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use reqwest::Url;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use crate::core::models::{AssetBundle, QuestionRecord};
use crate::core::types::LogEvent;

/// 下载到的一张图片
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// 图片下载器
#[allow(async_fn_in_trait)]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset>;
}

/// 默认下载器：reqwest 默认跟随重定向，非 2xx 视为失败
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("图片请求失败: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("图片下载返回 HTTP {}: {}", status, url));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.context("读取图片内容失败")?;
        Ok(FetchedAsset {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// 图片落地方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetMode {
    /// 编码成 data URL 随保存请求一起提交
    Bundle,
    /// 直接写入目录
    Disk(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetModeKind {
    #[default]
    Bundle,
    Disk,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetOptions {
    pub mode: AssetModeKind,
    /// 写入记录的本地路径前缀
    pub path_prefix: String,
    pub default_ext: String,
    /// disk 模式下的输出目录
    pub output_dir: String,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            mode: AssetModeKind::Bundle,
            path_prefix: "images/".to_string(),
            default_ext: "png".to_string(),
            output_dir: "output/images".to_string(),
        }
    }
}

impl AssetOptions {
    pub fn asset_mode(&self) -> AssetMode {
        match self.mode {
            AssetModeKind::Bundle => AssetMode::Bundle,
            AssetModeKind::Disk => AssetMode::Disk(PathBuf::from(&self.output_dir)),
        }
    }
}

/// 图片处理结果
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub bundle: AssetBundle,
    pub assigned: usize,
    pub failed: usize,
    pub events: Vec<LogEvent>,
}

/// 从图片地址推断扩展名，取不到就用默认值
pub fn image_extension(url: &str, default_ext: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| default_ext.to_string())
}

pub fn image_filename(question_index: usize, image_index: usize, ext: &str) -> String {
    format!("q{}_img{}.{}", question_index + 1, image_index + 1, ext)
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub fn data_url(asset: &FetchedAsset, ext: &str) -> String {
    let mime = asset
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| mime_for_extension(ext));
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(&asset.bytes))
}

async fn store(asset: &FetchedAsset, name: &str, ext: &str, mode: &AssetMode, bundle: &mut AssetBundle) -> Result<()> {
    match mode {
        AssetMode::Bundle => {
            bundle.insert(name.to_string(), data_url(asset, ext));
        }
        AssetMode::Disk(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("创建图片目录失败: {}", dir.display()))?;
            let path = dir.join(name);
            tokio::fs::write(&path, &asset.bytes)
                .await
                .with_context(|| format!("写入图片失败: {}", path.display()))?;
        }
    }
    Ok(())
}

/// 依次下载每道题的图片。路径先写进记录再下载，下载失败只记警告，路径保留。
pub async fn materialize_assets<F: ImageFetcher>(
    records: &mut [QuestionRecord],
    fetcher: &F,
    mode: &AssetMode,
    options: &AssetOptions,
) -> Materialized {
    let mut out = Materialized::default();

    for (qi, record) in records.iter_mut().enumerate() {
        let urls = record.original_image_urls.clone();
        for (ii, url) in urls.iter().enumerate() {
            let ext = image_extension(url, &options.default_ext);
            let name = image_filename(qi, ii, &ext);
            record.push_local_image(format!("{}{}", options.path_prefix, name));
            out.assigned += 1;

            let result = match fetcher.fetch(url).await {
                Ok(asset) => store(&asset, &name, &ext, mode, &mut out.bundle).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!("🖼️ 图片已保存: {} <- {}", name, url),
                Err(e) => {
                    out.failed += 1;
                    out.events.push(LogEvent::warn(format!(
                        "第 {} 题图片下载失败，保留路径 {}: {:#}",
                        record.id, name, e
                    )));
                }
            }
        }
    }

    if out.assigned > 0 {
        out.events.push(LogEvent::info(format!(
            "图片处理完成: {} 张，失败 {} 张",
            out.assigned, out.failed
        )));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::OptionMap;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, FetchedAsset>);

    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
            self.0.get(url).cloned().ok_or_else(|| anyhow!("404: {}", url))
        }
    }

    fn record(id: usize, urls: &[&str]) -> QuestionRecord {
        QuestionRecord {
            id,
            subject: "math".to_string(),
            question: "q".to_string(),
            options: OptionMap::new(),
            correct_answer: None,
            explanation: String::new(),
            has_diagram: false,
            image: None,
            local_image: None,
            images: Vec::new(),
            original_image_url: urls.first().map(|u| u.to_string()),
            original_image_urls: urls.iter().map(|u| u.to_string()).collect(),
            svg_code: None,
            topic: String::new(),
        }
    }

    #[test]
    fn extension_from_url_path() {
        assert_eq!(image_extension("https://cdn.example.com/a/b.JPG?x=1#f", "png"), "jpg");
        assert_eq!(image_extension("https://cdn.example.com/a/b", "png"), "png");
        assert_eq!(image_extension("https://cdn.example.com/a/b.toolong", "png"), "png");
        assert_eq!(image_extension("https://cdn.example.com/", "png"), "png");
        assert_eq!(image_extension("relative/pic.webp?v=3", "png"), "webp");
    }

    #[test]
    fn data_url_prefers_content_type() {
        let asset = FetchedAsset {
            bytes: b"abc".to_vec(),
            content_type: Some("image/gif; charset=binary".to_string()),
        };
        assert_eq!(data_url(&asset, "png"), "data:image/gif;base64,YWJj");
        let bare = FetchedAsset {
            bytes: b"abc".to_vec(),
            content_type: None,
        };
        assert_eq!(data_url(&bare, "jpg"), "data:image/jpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn failed_download_keeps_its_path() {
        let ok = "https://cdn.example.com/one.png";
        let broken = "https://cdn.example.com/two.jpeg";
        let fetcher = MapFetcher(HashMap::from([(
            ok.to_string(),
            FetchedAsset {
                bytes: vec![1, 2, 3],
                content_type: Some("image/png".to_string()),
            },
        )]));
        let mut records = vec![record(1, &[]), record(2, &[ok, broken])];

        let out = materialize_assets(&mut records, &fetcher, &AssetMode::Bundle, &AssetOptions::default()).await;

        let second = &records[1];
        assert_eq!(second.images, vec!["images/q2_img1.png", "images/q2_img2.jpeg"]);
        assert_eq!(second.image.as_deref(), Some("images/q2_img1.png"));
        assert_eq!(second.local_image, second.image);
        assert!(second.has_diagram);
        assert!(!records[0].has_diagram);
        assert_eq!(out.assigned, 2);
        assert_eq!(out.failed, 1);
        assert_eq!(out.bundle.len(), 1);
        assert!(out.bundle.get("q2_img1.png").is_some());
    }

    #[tokio::test]
    async fn disk_mode_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://cdn.example.com/fig.gif";
        let fetcher = MapFetcher(HashMap::from([(
            url.to_string(),
            FetchedAsset {
                bytes: vec![7; 4],
                content_type: None,
            },
        )]));
        let target = dir.path().join("imgs");
        let mut records = vec![record(1, &[url])];

        let out = materialize_assets(&mut records, &fetcher, &AssetMode::Disk(target.clone()), &AssetOptions::default()).await;

        assert_eq!(out.failed, 0);
        assert!(out.bundle.is_empty());
        assert_eq!(std::fs::read(target.join("q1_img1.gif")).unwrap(), vec![7; 4]);
    }
}
