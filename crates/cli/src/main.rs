//! OHQ CLI - Command-line interface for the office hours queue daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9640";

#[derive(Parser)]
#[command(name = "ohq")]
#[command(about = "Office hours queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "OHQ_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// User id to act as (0 = anonymous)
    #[arg(long = "as", env = "OHQ_UID", default_value = "0")]
    uid: i64,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a course queue
    Join { course_id: i64 },

    /// Leave a course queue
    Leave { course_id: i64 },

    /// List queue entries
    List {
        course_id: i64,

        /// Only entries in this status (waiting, assigned, in_progress, done)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show your place in line
    Position { course_id: i64 },

    /// Show queue status and your entry
    Status { course_id: i64 },

    /// Assign a waiting entry (staff)
    Assign {
        entry_id: i64,

        /// Helper user id (default: yourself)
        #[arg(long)]
        helper: Option<i64>,
    },

    /// Start the session of an assigned entry (staff)
    Start { entry_id: i64 },

    /// Mark an entry as done (staff)
    Resolve { entry_id: i64 },

    /// Send an entry to the back of the line (staff)
    Requeue { entry_id: i64 },

    /// Delete an entry (staff)
    Remove { entry_id: i64 },

    /// Take the next waiting entry (staff)
    TakeNext { course_id: i64 },

    /// Open a course queue (staff)
    Open { course_id: i64 },

    /// Close a course queue (staff)
    Close { course_id: i64 },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct Entry {
    id: i64,
    course_id: i64,
    requester_id: i64,
    status: String,
    helper_id: Option<i64>,
    joined_at: i64,
    updated_at: i64,
}

#[derive(Tabled)]
struct EntryRow {
    id: i64,
    course: i64,
    requester: i64,
    status: String,
    helper: String,
    joined: String,
    updated: String,
}

impl From<&Entry> for EntryRow {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            course: entry.course_id,
            requester: entry.requester_id,
            status: entry.status.clone(),
            helper: entry
                .helper_id
                .map(|uid| uid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            joined: format_time(entry.joined_at),
            updated: format_time(entry.updated_at),
        }
    }
}

#[derive(Deserialize)]
struct Position {
    position: i64,
    ahead: i64,
    estimated_wait_ms: i64,
}

#[derive(Deserialize)]
struct Summary {
    open: bool,
    waiting: u64,
    assigned: u64,
    in_progress: u64,
    done: u64,
}

#[derive(Deserialize)]
struct StatusResult {
    summary: Summary,
    active_entry: Option<Entry>,
    position: Position,
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

fn format_wait(millis: i64) -> String {
    let minutes = (millis + 59_999) / 60_000;
    match minutes {
        0 => "now".to_string(),
        1 => "~1 minute".to_string(),
        n => format!("~{} minutes", n),
    }
}

fn print_entry(title: &str, entry: &Entry) {
    println!("{}", title.green().bold());
    println!();
    println!("{}", Table::new([EntryRow::from(entry)]));
}

fn print_position(position: &Position) {
    if position.position < 0 {
        println!("  {} {}", "Position:".bold(), "not waiting".yellow());
        return;
    }
    println!("  {} {}", "Position:".bold(), position.position);
    println!("  {} {}", "Ahead of you:".bold(), position.ahead);
    println!(
        "  {} {}",
        "Estimated wait:".bold(),
        format_wait(position.estimated_wait_ms)
    );
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn call_entry(url: &str, method: &str, params: serde_json::Value) -> Result<Entry> {
    let result = call_rpc(url, method, params).await?;
    serde_json::from_value(result).context("Unexpected entry in response")
}

async fn set_open(url: &str, uid: i64, course_id: i64, open: bool) -> Result<()> {
    let params = json!({ "caller_uid": uid, "course_id": course_id, "open": open });
    call_rpc(url, "ohqueue.open.v1", params).await?;

    let verb = if open { "opened" } else { "closed" };
    println!(
        "{}",
        format!("✓ Queue for course {} {}", course_id, verb).green().bold()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli.rpc_url.as_str();
    let uid = cli.uid;

    match cli.command {
        Commands::Join { course_id } => {
            let params = json!({ "caller_uid": uid, "course_id": course_id });
            let entry = call_entry(url, "ohqueue.join.v1", params).await?;
            print_entry(&format!("✓ Joined queue for course {}", course_id), &entry);
        }

        Commands::Leave { course_id } => {
            let params = json!({ "caller_uid": uid, "course_id": course_id });
            let entry = call_entry(url, "ohqueue.leave.v1", params).await?;
            println!(
                "{}",
                format!("✓ Left queue for course {} (entry {})", course_id, entry.id)
                    .green()
                    .bold()
            );
        }

        Commands::List { course_id, status } => {
            let params = json!({ "caller_uid": uid, "course_id": course_id, "status": status });
            let result = call_rpc(url, "ohqueue.list.v1", params).await?;
            let entries: Vec<Entry> = serde_json::from_value(result["entries"].clone())
                .context("Unexpected entry list in response")?;

            if entries.is_empty() {
                println!("{}", "Queue is empty".yellow());
            } else {
                let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Position { course_id } => {
            let params = json!({ "caller_uid": uid, "course_id": course_id });
            let result = call_rpc(url, "ohqueue.position.v1", params).await?;
            let position: Position = serde_json::from_value(result)?;
            print_position(&position);
        }

        Commands::Status { course_id } => {
            println!("{}", format!("Course {} Queue", course_id).cyan().bold());
            println!();

            let params = json!({ "caller_uid": uid, "course_id": course_id });
            let result = call_rpc(url, "ohqueue.status.v1", params).await?;
            let status: StatusResult = serde_json::from_value(result)?;
            let summary = &status.summary;

            let state = if summary.open {
                "OPEN".green()
            } else {
                "CLOSED".red()
            };
            println!("  {} {}", "Queue:".bold(), state);
            println!("  {} {}", "Waiting:".bold(), summary.waiting);
            println!("  {} {}", "Assigned:".bold(), summary.assigned);
            println!("  {} {}", "In progress:".bold(), summary.in_progress);
            println!("  {} {}", "Done:".bold(), summary.done);
            println!();

            match &status.active_entry {
                Some(entry) => {
                    println!("  {} {} ({})", "Your entry:".bold(), entry.id, entry.status);
                    print_position(&status.position);
                }
                None => println!("  {} {}", "Your entry:".bold(), "none".yellow()),
            }
        }

        Commands::Assign { entry_id, helper } => {
            let params = json!({ "caller_uid": uid, "entry_id": entry_id, "helper_uid": helper });
            let entry = call_entry(url, "ohqueue.assign.v1", params).await?;
            print_entry(&format!("✓ Entry {} assigned", entry_id), &entry);
        }

        Commands::Start { entry_id } => {
            let params = json!({ "caller_uid": uid, "entry_id": entry_id });
            let entry = call_entry(url, "ohqueue.start.v1", params).await?;
            print_entry(&format!("✓ Session started for entry {}", entry_id), &entry);
        }

        Commands::Resolve { entry_id } => {
            let params = json!({ "caller_uid": uid, "entry_id": entry_id });
            let entry = call_entry(url, "ohqueue.resolve.v1", params).await?;
            print_entry(&format!("✓ Entry {} resolved", entry_id), &entry);
        }

        Commands::Requeue { entry_id } => {
            let params = json!({ "caller_uid": uid, "entry_id": entry_id });
            let entry = call_entry(url, "ohqueue.requeue.v1", params).await?;
            print_entry(&format!("✓ Entry {} requeued", entry_id), &entry);
        }

        Commands::Remove { entry_id } => {
            let params = json!({ "caller_uid": uid, "entry_id": entry_id });
            call_entry(url, "ohqueue.remove.v1", params).await?;
            println!("{}", format!("✓ Entry {} removed", entry_id).green().bold());
        }

        Commands::TakeNext { course_id } => {
            let params = json!({ "caller_uid": uid, "course_id": course_id });
            let result = call_rpc(url, "ohqueue.take_next.v1", params).await?;
            let entry: Option<Entry> = serde_json::from_value(result["entry"].clone())?;

            match entry {
                Some(entry) => print_entry("✓ Next entry assigned to you", &entry),
                None => println!("{}", "Nobody is waiting".yellow()),
            }
        }

        Commands::Open { course_id } => set_open(url, uid, course_id, true).await?,

        Commands::Close { course_id } => set_open(url, uid, course_id, false).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_staff_command() {
        let cli = Cli::try_parse_from(["ohq", "--as", "900", "assign", "12", "--helper", "901"])
            .unwrap();
        assert_eq!(cli.uid, 900);
        assert!(matches!(
            cli.command,
            Commands::Assign {
                entry_id: 12,
                helper: Some(901)
            }
        ));
    }

    #[test]
    fn test_entry_row_from_json() {
        let entry: Entry = serde_json::from_value(json!({
            "id": 3,
            "course_id": 101,
            "requester_id": 7,
            "status": "waiting",
            "helper_id": null,
            "joined_at": 1_000,
            "updated_at": 1_000
        }))
        .unwrap();

        let row = EntryRow::from(&entry);
        assert_eq!(row.helper, "-");
        assert_eq!(row.status, "waiting");
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(0), "now");
        assert_eq!(format_wait(60_000), "~1 minute");
        assert_eq!(format_wait(600_000), "~10 minutes");
        assert_eq!(format_wait(90_000), "~2 minutes");
    }
}
