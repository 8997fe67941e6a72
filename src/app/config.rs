use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::extract::ExtractOptions;
use crate::modules::answer_key::ReconcileOptions;
use crate::modules::browser::StabilizeOptions;
use crate::modules::storage::{AssetOptions, EmitOptions};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub run: RunDefaults,
    #[serde(default)]
    pub extract: ExtractOptions,
    #[serde(default)]
    pub answer_key: AnswerKeySettings,
    #[serde(default)]
    pub assets: AssetOptions,
    #[serde(default)]
    pub emit: EmitOptions,
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new("scrape.toml"));
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            let cfg: AppConfig = toml::from_str(&raw)
                .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
            return Ok(cfg);
        }
        Ok(AppConfig::default())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub url: Option<String>,
    /// 无头模式打开页面后的等待
    #[serde(default = "default_page_load_delay_ms")]
    pub page_load_delay_ms: u64,
    /// 无头模式等待选项按钮出现的上限
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(default)]
    pub stabilize: StabilizeOptions,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            headless: false,
            url: None,
            page_load_delay_ms: default_page_load_delay_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            stabilize: StabilizeOptions::default(),
        }
    }
}

/// 文件名、科目的默认值，交互模式下作为提示的预填内容
#[derive(Debug, Deserialize, Clone)]
pub struct RunDefaults {
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            filename: default_filename(),
            subject: default_subject(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerKeySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub align: ReconcileOptions,
}

impl Default for AnswerKeySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            align: ReconcileOptions::default(),
        }
    }
}

fn default_debug_port() -> u16 {
    9222
}

fn default_page_load_delay_ms() -> u64 {
    1000
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_filename() -> String {
    "questions.json".to_string()
}

fn default_subject() -> String {
    "general".to_string()
}

fn default_true() -> bool {
    true
}
