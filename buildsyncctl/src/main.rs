mod cli;
mod client;

use std::process;

use clap::Parser;
use serde_json::Value;

use buildsync::config::AppConfig;

use crate::cli::{Args, Commands};
use crate::client::Client;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = Client::new(&args.url);

    match args.command {
        Commands::Status => {
            let status: Value = client.get("/scheduler/status").await?;
            print_status(&status);
        }
        Commands::Start => print_message(client.post("/scheduler/start", None).await?),
        Commands::Stop => print_message(client.post("/scheduler/stop", None).await?),
        Commands::Pause => print_message(client.post("/scheduler/pause", None).await?),
        Commands::Resume => print_message(client.post("/scheduler/resume", None).await?),
        Commands::Scan => print_message(client.post("/scan", None).await?),
        Commands::Cancel => print_message(client.post("/scan/cancel", None).await?),
        Commands::Config => {
            let config: Value = client.get("/config").await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::SetInterval { minutes } => {
            let mut config: AppConfig = client.get("/config").await?;
            config.interval_minutes = minutes;
            let response: Value = client.put("/config", serde_json::to_value(&config)?).await?;
            print_message(response);
        }
        Commands::Deploy {
            server,
            local_path,
            remote_path,
        } => {
            let response: Value = client
                .post(
                    "/deploy",
                    Some(serde_json::json!({
                        "server": server,
                        "local_path": local_path,
                        "remote_path": remote_path,
                    })),
                )
                .await?;
            print_message(response);
        }
        Commands::Test { server_id } => {
            let response: Value = client
                .post(
                    "/deploy/test",
                    Some(serde_json::json!({ "server_id": server_id })),
                )
                .await?;
            print_message(response);
        }
        Commands::TestAll => {
            let report: Vec<String> = client.post("/deploy/test-all", None).await?;
            if report.is_empty() {
                println!("No enabled servers configured");
            }
            for line in report {
                println!("{}", line);
            }
        }
        Commands::Journal { limit } => {
            let entries: Vec<Value> = client.get("/journal").await?;
            for entry in entries.iter().take(limit) {
                println!(
                    "{} [{}] {}",
                    entry.get("time").and_then(Value::as_str).unwrap_or("-"),
                    entry.get("level").and_then(Value::as_str).unwrap_or("-"),
                    entry.get("msg").and_then(Value::as_str).unwrap_or("")
                );
            }
        }
        Commands::ClearJournal => print_message(client.delete("/journal").await?),
        Commands::History => {
            let log: Value = client.get("/history").await?;
            let entries = log
                .get("entries")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in entries {
                println!(
                    "{} {} {}",
                    entry.get("timestamp").and_then(Value::as_str).unwrap_or("-"),
                    entry
                        .get("action_type")
                        .and_then(Value::as_str)
                        .unwrap_or("-"),
                    entry
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                );
            }
        }
        Commands::ClearHistory => print_message(client.delete("/history").await?),
    }

    Ok(())
}

fn print_message(response: Value) {
    if let Some(message) = response.get("message").and_then(Value::as_str) {
        println!("{}", message);
    } else {
        println!("{}", response);
    }
}

fn print_status(status: &Value) {
    let run_state = status
        .get("run_state")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let next_run = status
        .get("next_run_time")
        .and_then(Value::as_str)
        .unwrap_or("-");
    let active_op = status
        .get("active_op")
        .and_then(Value::as_str)
        .unwrap_or("-");
    println!("State:     {}", run_state);
    println!("Next run:  {}", next_run);
    println!("Active op: {}", active_op);

    match status.get("progress") {
        Some(progress) if !progress.is_null() => {
            println!(
                "Progress:  {} {}% ({}/{} bytes)",
                progress.get("folder").and_then(Value::as_str).unwrap_or("-"),
                progress.get("percentage").and_then(Value::as_u64).unwrap_or(0),
                progress
                    .get("copied_bytes")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                progress
                    .get("total_bytes")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
            );
        }
        _ => println!("Progress:  idle"),
    }
}
