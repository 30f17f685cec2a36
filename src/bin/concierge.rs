//! Concierge entry points.
//!
//! Usage:
//!   cargo run --bin concierge -- serve
//!   cargo run --bin concierge -- demo
//!   EMAIL_ADDRESS=me@example.com EMAIL_APP_PASSWORD=... cargo run --bin concierge -- demo
//!
//! `serve` reads one request per line from stdin and runs the default
//! workflow against it; `demo` walks a fixed sequence of tool calls.
//! Credentials come from the environment (or a `.env` file); anything
//! missing degrades the owning provider instead of stopping the process.

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use concierge_agent::providers::default_specs;
use concierge_agent::{
    default_workflow, dispatch, AppConfig, Context, KeywordPlanner, Outcome, Planner, Registry,
};

#[derive(Parser)]
#[command(name = "concierge", about = "Personal-assistant capability orchestrator")]
struct Cli {
    /// Directory for the record stores (defaults to CONCIERGE_DATA_DIR or ./data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Long-running mode: one request per stdin line, aggregate JSON out
    Serve,
    /// One-shot demonstration sequence against the loaded providers
    Demo {
        /// User id for the memory round-trip
        #[arg(long, default_value = "user123")]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let (registry, load_errors) = Registry::load(default_specs(&config));
    for error in &load_errors {
        eprintln!("warning: {error}");
    }
    eprintln!("providers: {}", registry.names().join(", "));

    match cli.command {
        Command::Serve => serve(&registry).await,
        Command::Demo { user } => demo(&registry, &user).await,
    }
}

async fn serve(registry: &Registry) {
    let Some(workflow) = default_workflow(registry) else {
        eprintln!("error: no providers loaded, nothing to serve");
        std::process::exit(1);
    };

    eprintln!("concierge ready, one request per line (exit/quit to stop)");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            break;
        }

        match workflow.run(Context::new(trimmed)).await {
            Ok(ctx) => {
                let aggregate = serde_json::to_string_pretty(&ctx.to_value())
                    .unwrap_or_else(|_| "{}".into());
                println!("{aggregate}");
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    eprintln!("bye.");
}

async fn demo(registry: &Registry, user: &str) {
    eprintln!("--- memory round-trip ---");
    if let Some(memory) = registry.get("memory") {
        for (key, value) in [
            ("favorite_city", "Orlando"),
            ("preferred_email_time", "9:00 AM"),
            ("theme", "dark"),
        ] {
            let outcome = memory
                .invoke("store", &json!({"user_id": user, "key": key, "value": value}))
                .await;
            print_outcome(&format!("store {key}"), &outcome);
        }
        let outcome = memory
            .invoke("recall", &json!({"user_id": user, "key": "favorite_city"}))
            .await;
        print_outcome("recall favorite_city", &outcome);
    } else {
        eprintln!("memory provider unavailable, skipping");
    }

    eprintln!("--- notifications ---");
    if let Some(notification) = registry.get("notification") {
        for (title, message, priority) in [
            ("Meeting Reminder", "Team meeting in 30 minutes", "high"),
            ("Task Complete", "Code review finished", "normal"),
            ("FYI", "New documentation available", "low"),
        ] {
            let outcome = notification
                .invoke(
                    "send",
                    &json!({"title": title, "message": message, "priority": priority}),
                )
                .await;
            print_outcome(&format!("send `{title}`"), &outcome);
        }
        let outcome = notification.invoke("list", &json!({})).await;
        print_outcome("list", &outcome);
    } else {
        eprintln!("notification provider unavailable, skipping");
    }

    eprintln!("--- knowledge feeding email ---");
    if let Some(knowledge) = registry.get("knowledge") {
        let facts = knowledge
            .invoke("lookup", &json!({"query": "Orlando, Florida"}))
            .await;
        print_outcome("lookup Orlando", &facts);

        if let (Some(email), Some(summary)) = (
            registry.get("email"),
            facts.value().and_then(|v| v["summary"].as_str()),
        ) {
            let body = format!(
                "Hello!\n\nHere are some facts about Orlando, Florida:\n\n{summary}\n\nBest regards,\nConcierge"
            );
            let outcome = email
                .invoke(
                    "send",
                    &json!({"subject": "Random Orlando Facts", "body": body, "send_to_self": true}),
                )
                .await;
            print_outcome("send email", &outcome);
        }
    } else {
        eprintln!("knowledge provider unavailable, skipping");
    }

    eprintln!("--- planner routing ---");
    let request = "suggest a wellness break";
    match KeywordPlanner.choose(request, &registry.manifests()).await {
        Ok(calls) => {
            for (call, outcome) in dispatch(registry, &calls).await {
                print_outcome(&format!("{}::{}", call.provider, call.tool), &outcome);
            }
        }
        Err(e) => eprintln!("planner: {e}"),
    }
}

fn print_outcome(label: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success { value } => {
            let rendered = value.to_string();
            if rendered.chars().count() > 200 {
                let truncated: String = rendered.chars().take(200).collect();
                println!("ok   {label}: {truncated}...");
            } else {
                println!("ok   {label}: {rendered}");
            }
        }
        Outcome::Failure { kind, message } => {
            println!("fail {label}: [{kind}] {message}");
        }
    }
}
