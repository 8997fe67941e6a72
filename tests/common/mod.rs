#![allow(dead_code)]

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use exam_scrape::console::RunConsole;
use exam_scrape::core::{RunInputs, Severity};
use exam_scrape::modules::storage::{FetchedAsset, ImageFetcher};

/// 把日志收集起来的控制台
#[derive(Debug, Default)]
pub struct RecordingConsole {
    pub lines: Vec<(Severity, String)>,
}

impl RecordingConsole {
    pub fn warnings(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(s, _)| *s == Severity::Warn)
            .map(|(_, l)| l.as_str())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(s, _)| *s == Severity::Error)
            .map(|(_, l)| l.as_str())
            .collect()
    }
}

impl RunConsole for RecordingConsole {
    fn append_log_line(&mut self, text: &str, severity: Severity) {
        self.lines.push((severity, text.to_string()));
    }

    fn prompt_for_inputs(&mut self, defaults: &RunInputs) -> Result<RunInputs> {
        Ok(defaults.clone())
    }
}

/// 按地址返回固定内容的图片下载器
#[derive(Default)]
pub struct MapFetcher(pub HashMap<String, Vec<u8>>);

impl ImageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let bytes = self.0.get(url).cloned().ok_or_else(|| anyhow!("404: {}", url))?;
        Ok(FetchedAsset {
            bytes,
            content_type: None,
        })
    }
}

/// 收到的请求：请求行 + 请求体
pub type Received = Arc<Mutex<Vec<(String, String)>>>;

async fn handle(mut socket: TcpStream, body: String, received: Received) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    received.lock().unwrap().push((request_line, request_body));

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// 起一个对所有请求都返回同一段 JSON 的本地服务，返回端口和请求记录
pub async fn serve_json(body: String) -> (u16, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle(socket, body.clone(), log.clone()));
        }
    });
    (port, received)
}

fn block(ordinal: usize, question: &str, options: [&str; 4], extra: &str) -> String {
    format!(
        r#"<div class="question-card">
  <p class="stem">{ordinal}. {question}</p>
  <div class="options">
    <button>ক. {}</button>
    <button>খ. {}</button>
    {}
    <button>ঘ. {}</button>
  </div>
  {extra}
</div>"#,
        options[0],
        options[1],
        if extra.is_empty() {
            format!("<button>গ. {}</button>", options[2])
        } else {
            format!(
                r#"<button data-scrape-bg="rgb(40, 167, 69)">গ. {}</button>"#,
                options[2]
            )
        },
        options[3],
    )
}

/// 三道题；第二道把 গ 标成绿色并带解析框
pub fn three_question_page() -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Model test</title></head><body>
<header><nav><a href="/">Home</a></nav></header>
<main id="exam">
{}
{}
{}
</main>
</body></html>"#,
        block(1, "What is the capital of France?", ["Berlin", "Madrid", "Paris", "Rome"], ""),
        block(
            2,
            "Which gas do plants absorb from the air?",
            ["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"],
            r#"<div class="answer-box" data-scrape-bg="rgb(212, 237, 218)">Plants take in carbon dioxide for photosynthesis.</div>"#,
        ),
        block(3, "How many legs does a spider have?", ["Six", "Eight", "Ten", "Four"], ""),
    )
}
