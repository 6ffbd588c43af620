//! Entry-point for the `folio` binary.

use clap::Parser;
use folio_cli::Cli;
use folio_cli::run_main;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let cli = Cli::parse();
        run_main(cli).await
    })
}
