use clap::{Parser, Subcommand};
use coldreach::commands::{
    check_config, clear_portfolio, generate_email, setup_portfolio, show_config,
    show_portfolio_info,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coldreach")]
#[command(about = "Portfolio-grounded cold email generator for job postings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or verify the Ollama connection and settings
    Config {
        /// Check that the configured Ollama server is reachable
        #[arg(long)]
        check: bool,
    },
    /// Set up a portfolio from text or a document (PDF or plain text)
    Setup {
        /// Portfolio text given inline
        #[arg(long)]
        text: Option<String>,
        /// Path to a portfolio document
        #[arg(long)]
        file: Option<PathBuf>,
        /// Session the portfolio belongs to
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Show whether a session has portfolio data
    Info {
        /// Session to inspect
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Generate a cold email for a job posting URL or pasted description
    Generate {
        /// Job posting URL or the full posting text
        input: String,
        /// Session whose portfolio grounds the email
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Delete all portfolio data for a session
    Clear {
        /// Session to clear
        #[arg(long, default_value = "default")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { check } => {
            if check {
                check_config()?;
            } else {
                show_config()?;
            }
        }
        Commands::Setup {
            text,
            file,
            session,
        } => {
            setup_portfolio(text, file, &session).await?;
        }
        Commands::Info { session } => {
            show_portfolio_info(&session).await?;
        }
        Commands::Generate { input, session } => {
            generate_email(&input, &session).await?;
        }
        Commands::Clear { session } => {
            clear_portfolio(&session).await?;
        }
    }

    Ok(())
}
