// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use pointsgo_api::Client;
use pointsgo_app::AppState;
use runtime::HttpRuntime;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `pointsgo --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let base_url = config.backend_url(options.backend_url.as_deref());
    let client = Client::new(&base_url, config.backend_timeout()?).with_context(|| {
        format!(
            "invalid backend url {base_url:?} -- fix --backend-url, [backend].base_url or POINTSGO_BACKEND_URL"
        )
    })?;
    let ui_options = config.ui_options();
    if options.check_only {
        println!(
            "config ok: backend {} (timeout {:?}), page size {}, {} programs",
            client.base_url(),
            client.timeout(),
            ui_options.page_size,
            ui_options.programs.len()
        );
        return Ok(());
    }

    let _log_guard = logging::init_logging(config.log_level(), &config.log_file()?)?;
    tracing::info!(backend = client.base_url(), "connecting");

    let mut state = AppState::default();
    let mut runtime = HttpRuntime::new(client);
    pointsgo_tui::run_app(&mut state, &mut runtime, &ui_options)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    backend_url: Option<String>,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        backend_url: None,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--backend-url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--backend-url requires a url"))?;
                options.backend_url = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("pointsgo: flight availability console");
    println!("  --config <path>          Use a specific config path");
    println!("  --backend-url <url>      Override the backend base url");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and client setup, then exit");
    println!("  --help                   Show this help");
}
