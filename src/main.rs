//! `urpo-ctx` entry point.

use urpo_propagation::cli::{self, Cli};
use urpo_propagation::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    cli::execute(cli).await
}
