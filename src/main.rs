use clap::Parser;
use hybridtrader::cli::{run, Cli};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
            Targets::new()
                .with_target("hybridtrader", cli.log_level)
                .with_default(tracing::Level::WARN),
        );
    tracing_subscriber::registry().with(fmt_layer).init();

    run(cli)
}
