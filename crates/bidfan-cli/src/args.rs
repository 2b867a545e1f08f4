use clap::Parser;

/// One-shot auction driver: reads a bid request document, runs it through
/// the staged hook pipeline and the bidder fan-out, and prints the
/// assembled response.
#[derive(Debug, Parser)]
#[command(name = "bidfan", about = "Run one auction through the broker pipeline")]
pub struct Args {
    /// Path to the bid request JSON document.
    #[arg(long)]
    pub request: String,

    /// Bidders to fan out to, as repeated `name=endpoint-url` pairs.
    #[arg(long = "bidder", value_name = "NAME=URL")]
    pub bidders: Vec<String>,

    /// Path to the host-scope hook execution plan JSON (optional).
    #[arg(long)]
    pub host_plan: Option<String>,

    /// Path to the default-account hook execution plan JSON (optional).
    #[arg(long)]
    pub default_account_plan: Option<String>,

    /// Path to the account record JSON (optional).
    #[arg(long)]
    pub account: Option<String>,

    /// Endpoint the plans are resolved against.
    #[arg(long, default_value = "/openrtb2/auction")]
    pub endpoint: String,

    /// Auction wall-clock budget in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub timeout_ms: u64,

    /// Attach per-call debug records to the response.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
