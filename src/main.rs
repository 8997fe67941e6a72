use anyhow::Result;
use clap::Parser;
use tracing::info;

use exam_scrape::app::AppConfig;
use exam_scrape::cli::Args;
use exam_scrape::console::TerminalConsole;
use exam_scrape::logger;
use exam_scrape::workflow::{RunRequest, run};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    let source = args.page_source(&config)?;
    info!("📌 页面来源: {:?}", source);

    let request = RunRequest {
        source,
        exam_id: args.exam_id.clone(),
    };
    let mut console = TerminalConsole::new(args.interactive);
    let report = run(&config, request, &mut console).await?;

    info!("{}", report.outcome);
    Ok(())
}
