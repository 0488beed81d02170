use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "carbon-report",
    version,
    about = "Carbon footprint and social cost of carbon reports for infrastructure projects"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the interactive emission calculator and serve it.
    Emissions(ReportArgs),
    /// Write the social cost of carbon dashboard and serve it.
    SocialCost(ReportArgs),
    /// Edit and persist emission quantities from the terminal.
    Calc(CalcArgs),
    /// Print vulnerability and per-scenario social cost.
    Valuate(ValuateArgs),
}

#[derive(Args)]
pub struct ReportArgs {
    /// Output HTML file; defaults to the report's usual name in the current directory.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Defaults to 8000 for emissions and 8003 for social-cost.
    #[arg(long)]
    pub port: Option<u16>,

    /// JSON catalog replacing the built-in project data.
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_serve: bool,

    #[arg(long, default_value_t = false)]
    pub no_browser: bool,

    /// Also write `<stem>.zip` with the document, data.json and summary.txt.
    #[arg(long, default_value_t = false)]
    pub bundle: bool,
}

#[derive(Args)]
pub struct CalcArgs {
    #[arg(long)]
    pub project: Option<String>,

    /// KEY=VALUE; repeatable. Unparseable values count as zero.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Restore the seed quantities before applying --set.
    #[arg(long, default_value_t = false)]
    pub reset: bool,

    #[arg(long, default_value = ".carbon-report-cache.json")]
    pub cache: PathBuf,

    /// Keep edits in memory only; the cache file is neither read nor written.
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,

    #[arg(long)]
    pub data: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValuateArgs {
    /// Only this profile; all profiles when omitted.
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub data: Option<PathBuf>,
}
