//! Headless front end for the portfolio assistant: streams one answer to the
//! terminal, with the auxiliary backend endpoints exposed as subcommands.

use std::io::Write;
use std::time::Duration;

use anyhow::Context as _;
use anyhow::bail;
use folio_core::ChatClient;
use folio_core::ChatSession;
use folio_core::config::Config;
use folio_protocol::Message;
use folio_protocol::MessageContent;
use tracing::warn;

mod cli;
pub mod markdown;

pub use cli::Cli;
pub use cli::Command;

/// How long a cold backend gets to wake up before we send the question
/// anyway.
const WARMUP_WAIT: Duration = Duration::from_secs(30);

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_logging();

    let mut config = match &cli.base_url {
        Some(base_url) => Config::with_base_url(base_url.clone()),
        None => Config::default(),
    };
    config.style = cli.style;
    let client = ChatClient::new(config);

    match cli.command {
        Some(Command::Remaining) => {
            let remaining = client.remaining().await?;
            println!("{remaining}");
        }
        Some(Command::History) => {
            for record in client.history().await? {
                let text = match record.content.as_str() {
                    Some(text) => markdown::render(text),
                    None => record.content.to_string(),
                };
                println!("[{:?}] {text}", record.sender);
            }
        }
        Some(Command::Clear) => {
            client.clear_history().await?;
            println!("Conversation cleared.");
        }
        Some(Command::Health) => {
            if client.health().await {
                println!("backend is healthy");
            } else {
                bail!("backend did not answer its health probe");
            }
        }
        None => {
            let message = cli
                .message
                .as_deref()
                .context("a message is required (or use a subcommand; see --help)")?;
            run_chat(client, message, cli.json).await?;
        }
    }
    Ok(())
}

async fn run_chat(client: ChatClient, message: &str, json: bool) -> anyhow::Result<()> {
    if client.wait_until_healthy(WARMUP_WAIT).await.is_err() {
        warn!("backend health probe never settled, sending anyway");
    }

    let session = ChatSession::new(client);
    let mut handle = session.submit(message)?;

    // Ctrl-C is the user "stop": the turn settles and keeps whatever has
    // streamed in so far.
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut printed = String::new();
    let mut rewritten = false;
    let mut settled: Option<Message> = None;

    while let Some(snapshot) = handle.updates.recv().await {
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            let text = snapshot.content.text().to_string();
            if let Some(suffix) = text.strip_prefix(printed.as_str()) {
                print!("{suffix}");
                std::io::stdout().flush().ok();
                printed = text;
            } else if text != printed {
                // The duplicate cleaner rewrote text that is already on
                // screen; stop live-printing and show the settled answer at
                // the end instead.
                rewritten = true;
            }
        }
        if !snapshot.is_streaming {
            settled = Some(snapshot);
        }
    }

    let Some(settled) = settled else {
        return Ok(());
    };

    if !json {
        println!();
        if rewritten && !settled.is_error {
            println!("--- cleaned answer ---");
            println!("{}", markdown::render(settled.content.text()));
        }
        if let MessageContent::Structured(content) = &settled.content {
            if let Some(data) = &content.data {
                println!("[{} payload]", content.format);
                println!("{}", serde_json::to_string_pretty(data)?);
            }
        }
    }
    if let Some(parse_error) = &settled.parse_error {
        warn!("payload needed repair: {parse_error}");
    }
    if settled.is_error {
        bail!("turn failed: {}", settled.content.text());
    }
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
