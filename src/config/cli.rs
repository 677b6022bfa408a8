use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "contact-directory")]
#[command(about = "Discover and list contacts from the desktop address-book service")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Answer the account prompt with this label instead of asking
    #[arg(long)]
    pub account: Option<String>,

    /// Choose a single contact from the discovered set
    #[arg(long)]
    pub pick: bool,

    /// Print contacts as JSON
    #[arg(long)]
    pub json: bool,

    /// Give up on discovery after this many seconds
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}
