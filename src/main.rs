//! PlanSolve CLI
//!
//! 单次：`plansolve "北京现在几点"`；直接走规划循环：`plansolve --solve "..."`；
//! 不带 query 时逐行读取 stdin，每行一个请求。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use plansolve::{config::load_config, observability, Runtime};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "plansolve")]
#[command(about = "Multi-step task orchestrator: plan / execute / reflect", version)]
struct Cli {
    /// Extra config file (overrides config/default.toml)
    #[arg(short, long, env = "PLANSOLVE_CONFIG")]
    config: Option<PathBuf>,

    /// Run the planning loop directly instead of routing
    #[arg(long)]
    solve: bool,

    /// Attachment path or URL for multimodal requests (repeatable)
    #[arg(short, long = "attach")]
    attachments: Vec<String>,

    /// The request; read from stdin when omitted
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let runtime = Runtime::from_config(&cfg).context("Failed to build runtime")?;

    if !cli.query.is_empty() {
        let query = cli.query.join(" ");
        println!("{}", run_one(&runtime, &cli, &query).await);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        println!("{}", run_one(&runtime, &cli, query).await);
    }
    Ok(())
}

async fn run_one(runtime: &Runtime, cli: &Cli, query: &str) -> String {
    let outcome = if cli.solve {
        runtime.solve(query).await
    } else {
        runtime.handle(query, &cli.attachments).await
    };
    outcome.render()
}
