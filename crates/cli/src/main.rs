// ABOUTME: CLI for the letterbox curator: ingest a mail body, render a stored article, prune, report.
// ABOUTME: Settings come from LETTERBOX_* environment variables, overridden by flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use letterbox_curator::resource::decode_body;
use letterbox_curator::{Curator, CuratorBuilder, MailMessage, Options};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "letterbox")]
#[command(about = "Turn newsletter mail into self-hosted articles with curated images")]
struct Args {
    /// Root directory holding articles/, images/ and data/
    #[arg(long = "base-dir", global = true)]
    base_dir: Option<PathBuf>,

    /// Public origin articles are served from
    #[arg(long = "public-url", global = true)]
    public_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one message body and print the resulting article as JSON
    Ingest {
        /// HTML body of the message
        #[arg(long)]
        html: Option<PathBuf>,

        /// Plain-text body, used when there is no HTML body
        #[arg(long)]
        text: Option<PathBuf>,

        #[arg(long)]
        subject: String,

        /// Send date, e.g. "Tue, 2 Jan 2024 19:15:00 +0000"
        #[arg(long)]
        date: Option<String>,

        /// Do not submit the article to the read-later service
        #[arg(long = "no-publish")]
        no_publish: bool,

        /// Allow image downloads from private/local networks
        #[arg(long = "allow-private-networks")]
        allow_private_networks: bool,
    },
    /// Print a stored article as it is served
    Render {
        /// Article file name, `<uuid>.html`
        filename: String,
    },
    /// Delete the oldest articles beyond the retention limit
    Cleanup {
        /// Number of articles to keep
        #[arg(long)]
        max: Option<usize>,
    },
    /// Show storage usage
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("letterbox_curator=info,letterbox=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// RFC 2822 first, as mail headers use it, then anything dateparser accepts.
fn parse_mail_date(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s.trim()) {
        return Some(dt);
    }
    dateparser::parse(s).ok().map(|dt| dt.fixed_offset())
}

fn read_body(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("error reading file {:?}", path))?;
    Ok(decode_body(&bytes, None))
}

fn builder(args: &Args) -> Result<CuratorBuilder> {
    let mut builder = CuratorBuilder::from_options(Options::from_env()?);
    if let Some(dir) = &args.base_dir {
        builder = builder.base_dir(dir);
    }
    if let Some(url) = &args.public_url {
        builder = builder.public_base_url(url);
    }
    Ok(builder)
}

async fn run(args: Args) -> Result<()> {
    let builder = builder(&args)?;

    match args.command {
        Command::Ingest {
            html,
            text,
            subject,
            date,
            no_publish,
            allow_private_networks,
        } => {
            if html.is_none() && text.is_none() {
                anyhow::bail!("at least one of --html or --text is required");
            }
            let date = match date.as_deref() {
                Some(raw) => Some(
                    parse_mail_date(raw).with_context(|| format!("unrecognized date {:?}", raw))?,
                ),
                None => None,
            };
            let msg = MailMessage {
                subject,
                html: html.as_deref().map(read_body).transpose()?,
                text: text.as_deref().map(read_body).transpose()?,
                date,
            };
            debug!(subject = %msg.subject, "message loaded");

            let mut builder = builder.allow_private_networks(allow_private_networks);
            if no_publish {
                builder = builder.without_read_later();
            }
            let mut curator = builder.build();
            let processed = curator.process_message(&msg).await?;
            println!("{}", serde_json::to_string_pretty(&processed)?);
        }
        Command::Render { filename } => {
            let curator = builder.build();
            print!("{}", curator.render(&filename)?);
        }
        Command::Cleanup { max } => {
            let builder = match max {
                Some(max) => builder.max_articles(max),
                None => builder,
            };
            let curator: Curator = builder.build();
            let removed = curator.cleanup()?;
            println!("removed {} article(s)", removed);
        }
        Command::Stats { json } => {
            let stats = builder.build().stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("articles: {}", stats.total_articles);
                println!(
                    "articles/: {} files, {}",
                    stats.articles.count,
                    stats.articles.size
                );
                println!(
                    "data/:     {} files, {}",
                    stats.data.count,
                    stats.data.size
                );
                println!(
                    "images/:   {} files, {}",
                    stats.images.count,
                    stats.images.size
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
