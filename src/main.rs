//! `memcat` - categorize memories with whichever LLM provider is configured
//!
//! A thin operator CLI over `memcat-core`, mainly for checking a provider
//! setup by hand.

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::Style;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use memcat_core::config::{self, providers::ollama, EnvSnapshot, PROVIDER_CANDIDATES};
use memcat_core::llm::{check_credentials, CredentialStatus};
use memcat_core::{MemoryCategories, MemoryCategorizer};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Categorize { text, json } => handle_categorize(&text.join(" "), json).await,
        Commands::Providers => {
            handle_providers();
            Ok(())
        }
        Commands::Env { provider, api_key } => handle_env(&provider, api_key.as_deref()),
        Commands::Check => handle_check().await,
    }
}

/// Log to stderr so stdout carries only results
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn handle_categorize(text: &str, json: bool) -> Result<()> {
    let categorizer =
        MemoryCategorizer::from_env().context("Failed to configure LLM provider")?;

    let categories = categorizer
        .categorize(text)
        .await
        .context("Categorization failed")?;

    if json {
        let output = serde_json::to_string(&MemoryCategories { categories })?;
        println!("{}", output);
    } else {
        for category in categories {
            println!("{}", category);
        }
    }

    Ok(())
}

fn handle_providers() {
    let active = config::resolve(&EnvSnapshot::from_process());
    let active_name = active.as_ref().map(|p| p.name.as_str());

    let bold = Style::new().bold();
    let green = Style::new().green();
    let dim = Style::new().dim();

    println!(
        "{}",
        bold.apply_to(format!(
            "  {:<10} {:<20} {:<20} {:<10} {}",
            "NAME", "CREDENTIAL", "MODEL", "SCHEMA", "DESCRIPTION"
        ))
    );

    let rows = PROVIDER_CANDIDATES
        .iter()
        .map(|c| {
            (
                c.name,
                c.credential_env_key,
                c.default_model,
                c.supports_structured_output,
                c.description,
            )
        })
        .chain(std::iter::once((
            ollama::NAME,
            "-",
            ollama::DEFAULT_MODEL,
            false,
            ollama::DESCRIPTION,
        )));

    for (name, credential, model, structured, description) in rows {
        let line = format!(
            "{:<10} {:<20} {:<20} {:<10} {}",
            name,
            credential,
            model,
            if structured { "yes" } else { "no" },
            description
        );
        if active_name == Some(name) {
            println!("{} {}", green.apply_to("*"), green.apply_to(line));
        } else {
            println!("  {}", dim.apply_to(line));
        }
    }

    match active {
        Some(provider) => println!(
            "\nActive: {} ({}) at {}",
            bold.apply_to(&provider.name),
            provider.model_id,
            provider.base_url()
        ),
        None => println!("\nActive: none (categorization disabled)"),
    }
}

fn handle_env(provider: &str, api_key: Option<&str>) -> Result<()> {
    let Some(block) = config::provider_env(provider, api_key) else {
        let known: Vec<_> = config::provider_names().collect();
        bail!("Unknown provider '{}'. Known providers: {}", provider, known.join(", "));
    };

    for (key, value) in block {
        println!("{}={}", key, value);
    }

    Ok(())
}

async fn handle_check() -> Result<()> {
    let Some(provider) = config::resolve_from_process_env() else {
        bail!("No LLM provider configured");
    };

    match check_credentials(&provider).await {
        CredentialStatus::Valid => {
            println!(
                "{} {} accepted the credential",
                Style::new().green().apply_to("ok"),
                provider.name
            );
            Ok(())
        }
        CredentialStatus::Invalid { reason } => {
            bail!("{} rejected the credential: {}", provider.name, reason)
        }
    }
}
