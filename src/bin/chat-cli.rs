use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

use chat_gateway::protocol::HistoryRecord;
use chat_gateway::security::identity::X_USERNAME;

#[derive(Parser)]
#[command(name = "chat-cli")]
#[command(about = "Command-line client for the chat gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the gateway is up
    Health,
    /// Register a user with a fresh session id
    Register { username: String },
    /// List connected users
    Users,
    /// List groups and their members
    Groups,
    /// Create a group
    CreateGroup {
        name: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Delete a group
    DeleteGroup { name: String },
    /// Send a private message
    Send {
        from: String,
        to: String,
        message: String,
    },
    /// Send a message to a group
    SendGroup {
        from: String,
        group: String,
        message: String,
    },
    /// Show the private conversation between two users
    History { me: String, other: String },
    /// Show a group's conversation
    GroupHistory { group: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{url}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Register { username } => {
            let session_id = uuid::Uuid::new_v4().to_string();
            let res = client
                .post(format!("{url}/register"))
                .json(&json!({ "username": username, "sessionId": session_id }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Users => {
            let res = client.get(format!("{url}/users")).send().await?;
            print_response(res).await?;
        }
        Commands::Groups => {
            let res = client.get(format!("{url}/groups")).send().await?;
            print_response(res).await?;
        }
        Commands::CreateGroup { name, members } => {
            let res = client
                .post(format!("{url}/groups"))
                .json(&json!({ "groupName": name, "users": members }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::DeleteGroup { name } => {
            let res = client.delete(format!("{url}/groups/{name}")).send().await?;
            print_response(res).await?;
        }
        Commands::Send { from, to, message } => {
            let res = client
                .post(format!("{url}/private"))
                .headers(as_user(&from)?)
                .json(&json!({ "sender": from, "recipient": to, "message": message }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::SendGroup { from, group, message } => {
            let res = client
                .post(format!("{url}/group"))
                .headers(as_user(&from)?)
                .json(&json!({ "sender": from, "groupName": group, "message": message }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::History { me, other } => {
            let res = client.get(format!("{url}/private/{me}/{other}")).send().await?;
            print_history(res).await?;
        }
        Commands::GroupHistory { group } => {
            let res = client.get(format!("{url}/group/{group}")).send().await?;
            print_history(res).await?;
        }
    }

    Ok(())
}

fn as_user(name: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(X_USERNAME, HeaderValue::from_str(name)?);
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_history(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        return print_response(res).await;
    }

    let records: Vec<HistoryRecord> = res.json().await?;
    if records.is_empty() {
        println!("(no messages)");
    }
    for r in records {
        if r.timestamp.is_empty() {
            println!("{}: {}", r.sender, r.content);
        } else {
            println!("[{}] {}: {}", r.timestamp, r.sender, r.content);
        }
    }
    Ok(())
}
