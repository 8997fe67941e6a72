use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

use crate::core::models::RunInputs;
use crate::core::types::Severity;

/// 运行过程中和使用者打交道的一方：显示日志、询问文件名和科目
pub trait RunConsole {
    fn append_log_line(&mut self, text: &str, severity: Severity);
    fn prompt_for_inputs(&mut self, defaults: &RunInputs) -> Result<RunInputs>;
}

/// 终端实现：日志走 tracing，只有交互模式才读标准输入
#[derive(Debug, Clone, Default)]
pub struct TerminalConsole {
    interactive: bool,
}

impl TerminalConsole {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

/// 空输入沿用默认值
fn answer_or_default(line: &str, default: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn ask(prompt: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", prompt, default);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("读取输入失败")?;
    Ok(answer_or_default(&line, default))
}

impl RunConsole for TerminalConsole {
    fn append_log_line(&mut self, text: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("{}", text),
            Severity::Warn => warn!("⚠️ {}", text),
            Severity::Error => error!("❌ {}", text),
        }
    }

    fn prompt_for_inputs(&mut self, defaults: &RunInputs) -> Result<RunInputs> {
        if !self.interactive {
            return Ok(defaults.clone());
        }
        let filename = ask("保存文件名", &defaults.filename)?;
        let subject = ask("科目", &defaults.subject)?;
        Ok(RunInputs { filename, subject })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_answer_keeps_default() {
        assert_eq!(answer_or_default("  \n", "physics"), "physics");
        assert_eq!(answer_or_default(" chem \n", "physics"), "chem");
    }

    #[test]
    fn non_interactive_returns_defaults() {
        let defaults = RunInputs {
            filename: "a.json".to_string(),
            subject: "bio".to_string(),
        };
        let mut console = TerminalConsole::new(false);
        assert_eq!(console.prompt_for_inputs(&defaults).unwrap(), defaults);
    }
}
