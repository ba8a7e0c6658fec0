use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

// D-Bus proxy — `#[zbus::proxy]` generates `AgentProxy` (async), which is
// the only variant this binary uses.
#[zbus::proxy(
    interface = "org.derma.Agent1",
    default_service = "org.derma.Agent1",
    default_path = "/org/derma/Agent1"
)]
trait Agent {
    async fn analyze(
        &self,
        image_path: &str,
        consent: bool,
        second_opinion: bool,
    ) -> zbus::Result<String>;
    async fn routine(&self, session_id: &str) -> zbus::Result<String>;
    async fn chat(&self, session_id: &str, message: &str) -> zbus::Result<String>;
    async fn chat_history(&self, session_id: &str, limit: u32) -> zbus::Result<String>;
    async fn feedback(&self, session_id: &str, helpful: bool) -> zbus::Result<bool>;
    async fn export_report(&self, session_id: &str, output_path: &str) -> zbus::Result<String>;
    async fn history(&self, limit: u32) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "derma", about = "derma skin-analysis agent CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Helpful {
    Yes,
    No,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a face photo
    Analyze {
        /// Path to a clear, front-facing face photo (jpg or png)
        image: PathBuf,
        /// Agree that the image may be stored anonymously. Required.
        #[arg(long)]
        consent: bool,
        /// Skip the second brain and the consensus merge
        #[arg(long)]
        no_second_opinion: bool,
    },
    /// Show the skincare routine for a case
    Routine { session: String },
    /// Send a chat message
    Chat { session: String, message: String },
    /// Show the chat transcript for a case
    ChatLog {
        session: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Record whether the analysis helped
    Feedback {
        session: String,
        #[arg(long, value_enum)]
        helpful: Helpful,
    },
    /// Export the case report as a PDF
    Report {
        session: String,
        /// Output path for the PDF
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List recent cases
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Show daemon status
    Status,
}

async fn connect() -> Result<AgentProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("connect to the session bus")?;
    AgentProxy::new(&conn)
        .await
        .context("reach dermad on the bus — is it running?")
}

fn print_json(payload: &str) {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| payload.to_string())
        ),
        Err(_) => println!("{payload}"),
    }
}

fn print_steps(label: &str, value: &serde_json::Value) {
    println!("{label}:");
    if let Some(steps) = value.as_array() {
        for (i, step) in steps.iter().enumerate() {
            println!("  {}. {}", i + 1, step.as_str().unwrap_or_default());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            image,
            consent,
            no_second_opinion,
        } => {
            if !consent {
                anyhow::bail!(
                    "analysis requires --consent: the image may be stored anonymously \
                     to improve the agent, and the result is not medical advice"
                );
            }
            // The daemon reads the file itself; hand it an absolute path.
            let image = std::fs::canonicalize(&image)
                .with_context(|| format!("image not found: {}", image.display()))?;

            let proxy = connect().await?;
            let payload = proxy
                .analyze(&image.to_string_lossy(), consent, !no_second_opinion)
                .await?;
            print_json(&payload);

            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&payload) {
                if value["doctor_flag"].as_bool() == Some(true) {
                    println!("We recommend consulting a dermatologist for further evaluation.");
                }
            }
        }
        Commands::Routine { session } => {
            let proxy = connect().await?;
            let payload = proxy.routine(&session).await?;
            let plan: serde_json::Value =
                serde_json::from_str(&payload).context("daemon returned malformed routine")?;
            print_steps("Morning", &plan["morning"]);
            print_steps("Evening", &plan["evening"]);
        }
        Commands::Chat { session, message } => {
            let proxy = connect().await?;
            let reply = proxy.chat(&session, &message).await?;
            println!("{reply}");
        }
        Commands::ChatLog { session, limit } => {
            let proxy = connect().await?;
            let payload = proxy.chat_history(&session, limit).await?;
            let rows: serde_json::Value =
                serde_json::from_str(&payload).context("daemon returned malformed transcript")?;
            for row in rows.as_array().map(Vec::as_slice).unwrap_or_default() {
                println!(
                    "[{}] {}",
                    row["role"].as_str().unwrap_or("?"),
                    row["message"].as_str().unwrap_or_default()
                );
            }
        }
        Commands::Feedback { session, helpful } => {
            let proxy = connect().await?;
            proxy
                .feedback(&session, matches!(helpful, Helpful::Yes))
                .await?;
            println!("Thank you. This helps the AI learn.");
        }
        Commands::Report { session, output } => {
            let proxy = connect().await?;
            let written = proxy
                .export_report(&session, &output.to_string_lossy())
                .await?;
            println!("Report written to {written}");
        }
        Commands::History { limit } => {
            let proxy = connect().await?;
            let payload = proxy.history(limit).await?;
            let rows: serde_json::Value =
                serde_json::from_str(&payload).context("daemon returned malformed history")?;
            for row in rows.as_array().map(Vec::as_slice).unwrap_or_default() {
                println!(
                    "{}  {}  {:<12} {:>3}%  {}",
                    row["session_id"].as_str().unwrap_or("?"),
                    row["created_at"].as_str().unwrap_or("?"),
                    row["skin_type"].as_str().unwrap_or("?"),
                    row["confidence"].as_i64().unwrap_or(0),
                    row["brain_used"].as_str().unwrap_or("?"),
                );
            }
        }
        Commands::Status => {
            let proxy = connect().await?;
            print_json(&proxy.status().await?);
        }
    }

    Ok(())
}
