use clap::Parser;
use clap::Subcommand;
use folio_protocol::ResponseStyle;

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Talk to the portfolio assistant from the terminal")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Message to send. Required unless a subcommand is given.
    pub message: Option<String>,

    /// Answer style requested from the backend.
    #[arg(long, default_value = "NORMAL", value_parser = parse_style)]
    pub style: ResponseStyle,

    /// Backend origin; overrides FOLIO_API_BASE.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Emit one JSON message snapshot per line instead of live text.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the remaining question budget.
    Remaining,
    /// Print the persisted conversation.
    History,
    /// Clear the persisted conversation.
    Clear,
    /// Check whether the backend answers its health probe.
    Health,
}

fn parse_style(raw: &str) -> Result<ResponseStyle, String> {
    raw.parse::<ResponseStyle>()
        .map_err(|_| format!("unknown style {raw:?} (try NORMAL, FORMAL, EXPLANATORY, MINIMALIST or HR)"))
}
