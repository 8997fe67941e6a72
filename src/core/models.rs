use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 选项键，固定 a/b/c/d 四个，顺序与页面上的序号标记一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

    pub fn index(self) -> usize {
        match self {
            OptionKey::A => 0,
            OptionKey::B => 1,
            OptionKey::C => 2,
            OptionKey::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 解析 API 返回的答案字母，大小写不敏感，允许前后空白
    pub fn from_letter(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "a" => Some(OptionKey::A),
            "b" => Some(OptionKey::B),
            "c" => Some(OptionKey::C),
            "d" => Some(OptionKey::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::A => "a",
            OptionKey::B => "b",
            OptionKey::C => "c",
            OptionKey::D => "d",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type OptionMap = BTreeMap<OptionKey, String>;

/// 最终输出的题目记录，字段名与考试前端使用的 JSON 保持一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: usize,
    pub subject: String,
    pub question: String,
    pub options: OptionMap,
    pub correct_answer: Option<OptionKey>,
    pub explanation: String,
    pub has_diagram: bool,
    pub image: Option<String>,
    pub local_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub original_image_urls: Vec<String>,
    #[serde(rename = "svg_code")]
    pub svg_code: Option<String>,
    #[serde(default)]
    pub topic: String,
}

impl QuestionRecord {
    /// 记录一张图片的本地路径；第一张同时写入 image / localImage
    pub fn push_local_image(&mut self, path: String) {
        if self.images.is_empty() {
            self.image = Some(path.clone());
            self.local_image = Some(path.clone());
        }
        self.images.push(path);
        self.refresh_has_diagram();
    }

    pub fn refresh_has_diagram(&mut self) {
        self.has_diagram = !self.images.is_empty() || self.svg_code.is_some();
    }
}

/// 对账之前、单道题目从 DOM 中提取出的原始数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    pub id: usize,
    pub question: String,
    pub options: OptionMap,
    pub dom_answer: Option<OptionKey>,
    pub explanation: String,
    pub image_urls: Vec<String>,
    pub svg_code: Option<String>,
}

/// 本次运行收集到的图片：本地文件名 -> data URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetBundle(BTreeMap<String, String>);

impl AssetBundle {
    pub fn insert(&mut self, filename: String, data_url: String) {
        self.0.insert(filename, data_url);
    }

    pub fn get(&self, filename: &str) -> Option<&String> {
        self.0.get(filename)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// 一次抓取所需的人工输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub filename: String,
    pub subject: String,
}

/// 页面快照：CDP 抓下来的 HTML（已带计算样式标注）和页面地址
#[derive(Debug, Clone, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}
