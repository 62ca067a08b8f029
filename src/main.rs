//! Bee Dispatch 命令行入口
//!
//! 用法：
//! - `bee-dispatch [config.toml]`：逐行读取用户输入，分类 → 路由 → 应答，输入 quit 退出
//! - `bee-dispatch probe [tool] [config.toml]`：连接数据服务、列出工具并调用一个工具（默认 get_orders）

use std::path::PathBuf;

use anyhow::Context;
use bee_dispatch::agent::{build_runtime, discover_capability_count, probe};
use bee_dispatch::config::load_config;
use bee_dispatch::core::ConversationState;
use bee_dispatch::observability;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const DEFAULT_PROBE_TOOL: &str = "get_orders";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("probe") => {
            let tool = args.get(1).map(String::as_str).unwrap_or(DEFAULT_PROBE_TOOL);
            run_probe(tool, args.get(2).map(PathBuf::from)).await
        }
        _ => run_chat(args.first().map(PathBuf::from)).await,
    }
}

async fn run_probe(tool: &str, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = load_config(config_path).context("Failed to load config")?;
    let runtime = build_runtime(&cfg);

    println!("Connecting to data service: {} {}", cfg.service.command, cfg.service.args.join(" "));
    let report = probe(runtime.sessions.as_ref(), tool)
        .await
        .context("Failed to connect to data service")?;

    println!("Available tools ({}):", report.tools.len());
    for name in &report.tools {
        println!("  - {name}");
    }
    println!("Calling {}...", report.called);
    if report.result.success {
        println!("Result:\n{}", report.result.payload);
        Ok(())
    } else {
        anyhow::bail!("{}", report.result.message_content())
    }
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = load_config(config_path).context("Failed to load config")?;
    let runtime = build_runtime(&cfg);

    match discover_capability_count(runtime.sessions.as_ref()).await {
        Ok(count) => println!("Data service ready: {count} tools available."),
        Err(e) => {
            tracing::warn!(error = %e, "data service not reachable at startup");
            println!("Data service unavailable ({e}); seller data questions will report this.");
        }
    }
    println!("Type a message, or 'quit' to exit.");

    let mut state = ConversationState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }

        match runtime.graph.process_turn(&mut state, input).await {
            Ok(outcome) => {
                if outcome.classification_fallback {
                    println!("(could not classify the message, answering as logical)");
                }
                println!("Assistant: {}", outcome.reply.content);
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("Error: {e}");
            }
        }
    }

    let (prompt, completion, total) = runtime.oracle.token_usage();
    if total > 0 {
        println!("Token usage: prompt {prompt}, completion {completion}, total {total}");
    }
    Ok(())
}
