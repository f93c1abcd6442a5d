use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Config, default_base_dir};
use crate::jobinfo::JobInfo;
use crate::ollama::OllamaClient;
use crate::session::PortfolioService;

fn load_config() -> Result<Config> {
    let base_dir = default_base_dir().context("Failed to resolve data directory")?;
    Config::load(&base_dir)
}

fn load_service() -> Result<PortfolioService> {
    let config = load_config()?;
    PortfolioService::new(config).context("Failed to initialize portfolio service")
}

/// Print the active configuration and where it came from
#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config()?;

    println!("Configuration ({})", config.base_dir.join("config.toml").display());
    println!();
    println!("Ollama server: {}", config.ollama_url()?);
    println!("Embedding model: {}", config.ollama.embedding_model);
    println!("Generation model: {}", config.ollama.generation_model);
    println!(
        "Chunking: size {} / overlap {}",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!(
        "Fetch: {} ({}s timeout, {} char page limit)",
        config.fetch.user_agent, config.fetch.timeout_seconds, config.fetch.max_page_chars
    );
    println!("Session stores: {}", config.stores_dir().display());

    Ok(())
}

/// Verify the Ollama server is reachable
#[inline]
pub fn check_config() -> Result<()> {
    let config = load_config()?;
    let client = OllamaClient::new(&config)?;

    client.ping().context("Ollama server is not reachable")?;
    println!("Ollama server at {} is reachable", config.ollama_url()?);

    Ok(())
}

/// Ingest a portfolio from inline text or from a file
#[inline]
pub async fn setup_portfolio(
    text: Option<String>,
    file: Option<PathBuf>,
    session: &str,
) -> Result<()> {
    let service = load_service()?;

    let chunk_count = match (text, file) {
        (Some(text), None) => service.setup_portfolio_text(&text, session).await?,
        (None, Some(path)) => service.setup_portfolio_file(&path, session).await?,
        (Some(_), Some(_)) => bail!("Provide either --text or --file, not both"),
        (None, None) => bail!("Provide your portfolio with --text or --file"),
    };

    info!("Portfolio ingested for session {}", session);
    println!(
        "Portfolio processed successfully ({} chunks created)",
        chunk_count
    );
    println!("{}", service.portfolio_info(session).await);

    Ok(())
}

/// Show whether the session has a portfolio and how large it is
#[inline]
pub async fn show_portfolio_info(session: &str) -> Result<()> {
    let service = load_service()?;

    if service.has_portfolio(session).await {
        println!("Portfolio ready for session '{}'", session);
    } else {
        println!("No portfolio set up for session '{}'", session);
        println!("Use 'coldreach setup --session {} --text ...' to create one.", session);
    }
    println!("{}", service.portfolio_info(session).await);

    Ok(())
}

/// Generate a cold email for a job posting URL or pasted description
#[inline]
pub async fn generate_email(job_input: &str, session: &str) -> Result<()> {
    let service = load_service()?;

    if !service.has_portfolio(session).await {
        println!("No portfolio found for session '{}'.", session);
        println!(
            "Set one up first: coldreach setup --session {} --text \"...\"",
            session
        );
        return Ok(());
    }

    let (job_info, email) = service.generate_email(job_input, session).await?;

    println!("Extracted job requirements:");
    match &job_info {
        JobInfo::Parsed(parsed) => {
            println!("{}", serde_json::to_string_pretty(parsed)?);
        }
        JobInfo::Fallback { .. } => {
            println!("(structured extraction unavailable, using raw description)");
        }
    }
    println!();
    println!("Generated email:");
    println!("{}", email);

    Ok(())
}

/// Remove all portfolio data for the session
#[inline]
pub async fn clear_portfolio(session: &str) -> Result<()> {
    let service = load_service()?;

    if service.clear_portfolio(session).await {
        println!("Portfolio data for session '{}' has been cleared", session);
    } else {
        println!("No portfolio data to clear for session '{}'", session);
    }

    Ok(())
}
