// SPDX-License-Identifier: MPL-2.0

mod host;

use std::path::PathBuf;

use bg_switcher_lib::{Options, Stylesheet, markup::plugin_markup};
use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::prelude::*;

/// Background switcher driven from the terminal
#[derive(Parser, Debug)]
#[command(name = "bg-switcher")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Options file in RON format
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stylesheet checked for switcher rules and `--bg` values (repeatable)
    #[arg(long = "stylesheet")]
    stylesheets: Vec<PathBuf>,

    /// Construct the switcher even if no stylesheet references it
    #[arg(long)]
    force: bool,

    /// Print the generated markup and exit
    #[arg(long)]
    print_markup: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::var("RUST_SPANTRACE").is_err() {
        unsafe {
            std::env::set_var("RUST_SPANTRACE", "0");
        }
    }

    init_logger();

    let args = Args::parse();

    let options_path = args.config.clone().or_else(Options::default_path);
    let options = match &options_path {
        Some(path) => Options::load_or_default(path)
            .wrap_err_with(|| format!("failed to load options from {}", path.display()))?,
        None => Options::default(),
    };

    if args.print_markup {
        println!("{}", plugin_markup(&options.merge()).to_html());
        return Ok(());
    }

    let stylesheets = args
        .stylesheets
        .iter()
        .map(|path| {
            Stylesheet::load(path)
                .wrap_err_with(|| format!("failed to read stylesheet {}", path.display()))
        })
        .collect::<eyre::Result<Vec<_>>>()?;

    host::Host::run(host::HostConfig {
        options,
        options_path,
        stylesheets,
        force: args.force,
    })?;

    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    let log_format = tracing_subscriber::fmt::format()
        .pretty()
        .without_time()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_thread_names(true);

    let log_filter = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(log_format)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            metadata.level() == &tracing::Level::ERROR
                || (metadata.target().starts_with("bg_switcher") && metadata.level() <= &log_level)
        }));

    tracing_subscriber::registry().with(log_filter).init();
}
