use std::io::Write;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use shared::protocol::{UssdReply, UssdRequest};
use storage::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "Operator tools for the USSD voting gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the voting menu from the terminal, one line per keypad entry.
    Dial {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server_url: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long, default_value = "*384#")]
        service_code: String,
    },
    /// Delete session records whose ttl has passed.
    PurgeSessions {
        #[arg(long, default_value = "sqlite://./data/ussd.db")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Dial {
            server_url,
            phone,
            session_id,
            service_code,
        } => {
            let session_id = session_id.unwrap_or_else(|| format!("SIM-{}", Uuid::new_v4()));
            dial(&server_url, &phone, &session_id, &service_code).await?;
        }
        Command::PurgeSessions { database_url } => {
            let storage = Storage::new(&database_url).await?;
            let removed = storage.purge_expired().await?;
            println!("removed {removed} expired sessions");
        }
    }

    Ok(())
}

async fn dial(server_url: &str, phone: &str, session_id: &str, service_code: &str) -> Result<()> {
    let endpoint = format!("{}/ussd", server_url.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut entered: Vec<String> = Vec::new();

    println!("dialing {service_code} as {phone} (session {session_id})\n");
    loop {
        let request = UssdRequest {
            session_id: Some(session_id.to_string()),
            phone_number: Some(phone.to_string()),
            text: Some(entered.join("*")),
            service_code: Some(service_code.to_string()),
        };
        debug!(?request, %endpoint, "posting ussd request");
        let body = client
            .post(&endpoint)
            .form(&request)
            .send()
            .await
            .with_context(|| format!("failed to reach {endpoint}"))?
            .error_for_status()?
            .text()
            .await?;
        let reply = UssdReply::parse(&body)
            .ok_or_else(|| anyhow!("unexpected response from gateway: {body:?}"))?;

        println!("{}\n", reply.text());
        if reply.is_terminal() {
            return Ok(());
        }

        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        entered.push(line.trim().to_string());
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
