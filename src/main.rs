use anyhow::Context;
use clap::Parser;
use contact_directory::adapters::{PromptPicker, SessionBusConnector, VCardDecoder};
use contact_directory::utils::{logger, validation::Validate};
use contact_directory::{CancellationToken, CliConfig, Contact, DirectoryOrchestrator, DiscoveryConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting contact-directory");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match &cli.config {
        Some(path) => DiscoveryConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => DiscoveryConfig::default(),
    };
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        return Err(e).context("Invalid configuration");
    }

    let cancel = CancellationToken::new();
    watch_for_cancellation(cancel.clone(), cli.timeout_seconds.map(Duration::from_secs));

    let directory = DirectoryOrchestrator::new(
        SessionBusConnector,
        PromptPicker::terminal(cli.account.clone()),
        VCardDecoder,
        config,
    );

    let contacts: Vec<Contact> = if cli.pick {
        directory.pick_contact(&cancel).await.into_iter().collect()
    } else {
        directory.discover(&cancel).await
    };
    cancel.cancel();

    print_contacts(&contacts, cli.json)
}

/// Cancels on Ctrl-C or when the optional time limit runs out.
fn watch_for_cancellation(cancel: CancellationToken, limit: Option<Duration>) {
    tokio::spawn(async move {
        let expired = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling discovery");
                cancel.cancel();
            }
            _ = expired => {
                tracing::warn!("Time limit reached, cancelling discovery");
                cancel.cancel();
            }
        }
    });
}

fn print_contacts(contacts: &[Contact], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(contacts)?);
        return Ok(());
    }

    if contacts.is_empty() {
        eprintln!("No contacts found");
        return Ok(());
    }

    for contact in contacts {
        let mut line = contact.display_name().to_string();
        if !contact.title().is_empty() {
            line.push_str(&format!(" ({})", contact.title()));
        }
        for email in contact.emails() {
            line.push_str(&format!("  <{}>", email.address));
        }
        for phone in contact.phones() {
            line.push_str(&format!("  {}", phone.number));
        }
        println!("{}", line);
    }
    Ok(())
}
