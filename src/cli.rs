use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::app::AppConfig;
use crate::modules::storage::EmitTarget;
use crate::modules::storage::assets::AssetModeKind;
use crate::workflow::PageSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Endpoint,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetsArg {
    Bundle,
    Disk,
}

#[derive(Debug, Parser)]
#[command(name = "exam_scrape")]
#[command(about = "从考试页面抓取选择题并保存", long_about = None)]
pub struct Args {
    /// 配置文件路径，默认 ./scrape.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 要抓取的页面地址
    #[arg(long)]
    pub url: Option<String>,

    /// 启动无头浏览器打开 --url，而不是连接已有浏览器
    #[arg(long)]
    pub headless: bool,

    /// 已有浏览器的调试端口
    #[arg(long)]
    pub port: Option<u16>,

    /// 直接解析本地 HTML 文件
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// 本地 HTML 对应的页面地址
    #[arg(long)]
    pub page_url: Option<String>,

    #[arg(long)]
    pub filename: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,

    /// 覆盖从页面地址推断的考试 id
    #[arg(long)]
    pub exam_id: Option<String>,

    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    /// file 模式的输出路径
    #[arg(long)]
    pub output: Option<String>,

    #[arg(long, value_enum)]
    pub assets: Option<AssetsArg>,

    /// 不请求答案接口
    #[arg(long)]
    pub no_answer_key: bool,

    /// 运行时询问文件名和科目
    #[arg(long)]
    pub interactive: bool,
}

impl Args {
    /// 命令行参数覆盖配置文件
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.browser.debug_port = port;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(url) = &self.url {
            config.browser.url = Some(url.clone());
        }
        if let Some(filename) = &self.filename {
            config.run.filename = filename.clone();
        }
        if let Some(subject) = &self.subject {
            config.run.subject = subject.clone();
        }
        if let Some(target) = self.target {
            config.emit.target = match target {
                TargetArg::Endpoint => EmitTarget::Endpoint,
                TargetArg::File => EmitTarget::File,
            };
        }
        if let Some(output) = &self.output {
            config.emit.output = Some(output.clone());
        }
        if let Some(assets) = self.assets {
            config.assets.mode = match assets {
                AssetsArg::Bundle => AssetModeKind::Bundle,
                AssetsArg::Disk => AssetModeKind::Disk,
            };
        }
        if self.no_answer_key {
            config.answer_key.enabled = false;
        }
    }

    /// 本地文件优先，其次无头浏览器，最后连接已有浏览器
    pub fn page_source(&self, config: &AppConfig) -> Result<PageSource> {
        if let Some(path) = &self.html {
            let page_url = self
                .page_url
                .clone()
                .or_else(|| config.browser.url.clone())
                .unwrap_or_default();
            return Ok(PageSource::File {
                path: path.clone(),
                page_url,
            });
        }
        if config.browser.headless {
            let url = config
                .browser
                .url
                .clone()
                .ok_or_else(|| anyhow!("无头模式需要 --url"))?;
            return Ok(PageSource::Headless { url });
        }
        Ok(PageSource::Attach {
            port: config.browser.debug_port,
            url: config.browser.url.clone(),
        })
    }
}
