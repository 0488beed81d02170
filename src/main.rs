mod cli;
mod core;
mod host;
mod logging;
mod report;

fn main() -> anyhow::Result<()> {
    cli::run::entry()
}
