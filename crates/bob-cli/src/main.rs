//! Bob CLI - mailbox agent daemon and command line tool
//!
//! `bob run` polls the inbox, answers approved senders and now and then
//! browses Moltbook. The other commands run one piece of that by hand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use rand::Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bob_core::allowlist::{AllowList, SqliteAllowList};
use bob_core::browse::{BrowseOutcome, MoltbookBrowser};
use bob_core::config::{Config, ConfigManager};
use bob_core::mail::{ImapSmtpMailbox, Mailbox, OutboundEmail};
use bob_core::orchestration::{OrchestrationLoop, RunOptions};
use bob_core::provider::create_generator;
use bob_core::responder::{Disposition, EmailResponder};
use bob_core::tools::moltbook::MoltbookClient;
use bob_core::tools::{ToolKind, ToolRegistry, ToolRegistryBuilder};

#[derive(Parser)]
#[command(name = "bob")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Email-answering agent running on a local language model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/bob/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the inbox forever, browsing Moltbook now and then
    Run,

    /// Process the inbox once
    Once,

    /// Answer a single prompt and print the reply
    Ask {
        prompt: String,

        /// Answer without tools
        #[arg(long)]
        no_tools: bool,
    },

    /// Comment on a random Moltbook post
    Browse,

    /// Add an address to the allow-list
    Approve { email: String },

    /// List approved senders
    Approved,

    /// Show available tools
    Tools,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Long-lived collaborators shared by every command
struct Runtime {
    config: Config,
    mailbox: Option<Arc<ImapSmtpMailbox>>,
    orchestration: Arc<OrchestrationLoop>,
}

impl Runtime {
    fn build(config: Config) -> anyhow::Result<Self> {
        let mailbox = if config.mail.is_configured() {
            Some(Arc::new(ImapSmtpMailbox::from_config(&config.mail)?))
        } else {
            warn!("Mailbox not configured; email features are disabled");
            None
        };

        let mut builder = ToolRegistryBuilder::new(config.clone());
        if let Some(mailbox) = &mailbox {
            builder = builder.with_mailbox(mailbox.clone() as Arc<dyn Mailbox>);
        }
        let registry = Arc::new(builder.build());

        let generator = create_generator(&config.model)?;
        let orchestration = Arc::new(OrchestrationLoop::new(&config, generator, registry));

        Ok(Self {
            config,
            mailbox,
            orchestration,
        })
    }

    fn mailbox(&self) -> anyhow::Result<Arc<ImapSmtpMailbox>> {
        self.mailbox
            .clone()
            .context("mailbox not configured: set mail.address and the app password variable")
    }

    fn responder(&self) -> anyhow::Result<EmailResponder> {
        let mailbox = self.mailbox()?;
        let allow_list: Arc<dyn AllowList> = Arc::new(SqliteAllowList::open(&self.config.allow_list.database)?);
        Ok(EmailResponder::new(
            mailbox.clone() as Arc<dyn Mailbox>,
            allow_list,
            self.orchestration.clone(),
            mailbox.address(),
        )
        .with_approved_phrase(self.config.mail.approved_phrase()))
    }

    fn browser(&self) -> anyhow::Result<Option<MoltbookBrowser>> {
        let Some(api_key) = self.config.moltbook.get_api_key() else {
            return Ok(None);
        };
        let client = Arc::new(MoltbookClient::new(&self.config.moltbook.base_url, api_key)?);
        Ok(Some(MoltbookBrowser::new(client, self.orchestration.clone())))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_filter = if cli.verbose {
        "info,bob_core=debug"
    } else {
        "warn,bob_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config_manager = match cli.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };

    match cli.command {
        Commands::Config { init } => show_config(&config_manager, init)?,
        Commands::Approve { email } => approve(config_manager.config(), &email)?,
        Commands::Approved => list_approved(config_manager.config())?,
        Commands::Tools => {
            let runtime = Runtime::build(config_manager.config().clone())?;
            show_tools(runtime.orchestration.registry());
        }
        Commands::Ask { prompt, no_tools } => {
            let runtime = Runtime::build(config_manager.config().clone())?;
            ask(&runtime, &prompt, no_tools).await;
        }
        Commands::Once => {
            let runtime = Runtime::build(config_manager.config().clone())?;
            process_once(&runtime).await?;
        }
        Commands::Browse => {
            let runtime = Runtime::build(config_manager.config().clone())?;
            browse(&runtime).await?;
        }
        Commands::Run => {
            let runtime = Runtime::build(config_manager.config().clone())?;
            run_daemon(&runtime).await?;
        }
    }

    Ok(())
}

async fn ask(runtime: &Runtime, prompt: &str, no_tools: bool) {
    let options = if no_tools {
        RunOptions::without_tools()
    } else {
        RunOptions::default()
    };
    let outcome = runtime.orchestration.run_with(prompt, options).await;

    println!("{}", outcome.response);
    for artifact in &outcome.artifacts {
        println!("  {} {}", style("Attachment:").dim(), style(artifact.display()).cyan());
    }
    if outcome.degraded {
        eprintln!("{}", style("Model unavailable; returned the fallback reply").yellow());
    }
}

async fn process_once(runtime: &Runtime) -> anyhow::Result<()> {
    let report = runtime.responder()?.process_inbox().await?;

    if report.processed.is_empty() {
        println!("{}", style("No new messages").dim());
    }
    for item in &report.processed {
        let status = match &item.disposition {
            Disposition::Replied { .. } => style("replied").green(),
            Disposition::ApprovedAndReplied { .. } => style("approved + replied").green(),
            Disposition::NotApproved => style("ignored").dim(),
            Disposition::OwnMessage => style("own message").dim(),
            Disposition::Failed(_) => style("failed").red(),
        };
        println!("  {} {} - {}", status, style(&item.sender).cyan(), item.subject);
    }
    Ok(())
}

async fn browse(runtime: &Runtime) -> anyhow::Result<()> {
    let browser = runtime
        .browser()?
        .context("Moltbook not configured: set the API key variable")?;

    match browser.browse().await? {
        BrowseOutcome::EmptyFeed => println!("{}", style("Feed is empty").dim()),
        BrowseOutcome::Commented { post_id, comment } => {
            println!("{} {}", style("Commented on post").green(), style(post_id).cyan());
            println!("{}", comment);
        }
    }
    Ok(())
}

async fn run_daemon(runtime: &Runtime) -> anyhow::Result<()> {
    let responder = runtime.responder()?;
    let browser = runtime.browser()?;
    let interval = Duration::from_secs(runtime.config.mail.poll_interval_secs.max(1));
    let browse_probability = runtime.config.moltbook.browse_probability.clamp(0.0, 1.0);

    info!(interval_secs = interval.as_secs(), "Bob is running");

    loop {
        match responder.process_inbox().await {
            Ok(report) => info!(
                messages = report.processed.len(),
                replied = report.replied(),
                failed = report.failed(),
                "Inbox processed"
            ),
            Err(e) => {
                error!("Inbox cycle failed: {}", e);
                notify_admin(runtime, &format!("Processing the inbox failed:\n\n{}", e)).await;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }

        if let Some(browser) = &browser {
            if rand::rng().random_bool(browse_probability) {
                if let Err(e) = browser.browse().await {
                    warn!("Browsing failed: {}", e);
                }
            }
        }
    }
}

/// Mail an error report to the configured admin, if any
async fn notify_admin(runtime: &Runtime, body: &str) {
    let (Some(admin), Some(mailbox)) = (&runtime.config.mail.admin_email, &runtime.mailbox) else {
        return;
    };
    let email = OutboundEmail::new(admin, "Bob encountered an error", body);
    if let Err(e) = mailbox.send(email).await {
        error!("Failed to notify admin: {}", e);
    }
}

fn approve(config: &Config, email: &str) -> anyhow::Result<()> {
    let list = SqliteAllowList::open(&config.allow_list.database)?;
    if list.approve(email)? {
        println!("{} {}", style("Approved").green(), style(email).cyan());
    } else {
        println!("{} is already approved", style(email).cyan());
    }
    Ok(())
}

fn list_approved(config: &Config) -> anyhow::Result<()> {
    let list = SqliteAllowList::open(&config.allow_list.database)?;
    let senders = list.list()?;

    println!("{}", style("Approved senders:").bold());
    if senders.is_empty() {
        println!("  {}", style("none").dim());
    }
    for sender in senders {
        println!("  {} {}", style(&sender.email).cyan(), style(sender.added_at).dim());
    }
    Ok(())
}

fn show_tools(registry: &ToolRegistry) {
    println!("{}", style("Available Tools:").bold());
    println!();

    for kind in ToolKind::ALL {
        let spec = kind.spec();
        let status = if registry.get(kind).is_some() {
            style("enabled").green()
        } else {
            style("disabled").dim()
        };
        println!("  {} [{}]", style(spec.name).cyan(), status);
        println!("    {}", spec.description);
    }
}

fn show_config(manager: &ConfigManager, init: bool) -> anyhow::Result<()> {
    let config = manager.config();

    println!("{}", style("Configuration:").bold());
    println!("  File: {}", style(manager.config_path().display()).green());
    println!("  Backend: {:?} ({})", config.model.backend, style(&config.model.base_url).cyan());
    println!(
        "  Mailbox: {}",
        if config.mail.is_configured() {
            style(config.mail.address.as_str()).green()
        } else {
            style("not configured").yellow()
        }
    );
    println!("  Allow-list: {}", config.allow_list.database.display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);

    if init {
        manager.save()?;
        println!("{} {}", style("Wrote").green(), manager.config_path().display());
    }
    Ok(())
}
