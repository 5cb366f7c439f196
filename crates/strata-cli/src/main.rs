mod admin;
mod cli;
mod context;
mod inspect;
mod render;
mod sparse;
mod volumes;

use clap::Parser;
use cli::{Cli, Commands};
use context::AppContext;
use eyre::Result;
use std::process::ExitCode;
use strata_core::config;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.config_dir {
        config::set_config_dir(dir);
    }
    let ctx = AppContext::load(cli.json);

    match &cli.command {
        Commands::Stat(args) => inspect::run_stat(&ctx, args),
        Commands::List(args) => inspect::run_list(&ctx, args),
        Commands::Mkdir(args) => admin::run_mkdir(args),
        Commands::Extents(args) => sparse::run_extents(&ctx, args),
        Commands::CopySparse(args) => sparse::run_copy_sparse(&ctx, args),
        Commands::GetSd(args) => admin::run_get_sd(&ctx, args),
        Commands::SetSd(args) => admin::run_set_sd(&ctx, args),
        Commands::Symlink(args) => admin::run_symlink(args),
        Commands::Drives => volumes::run_drives(&ctx),
        Commands::Volumes => volumes::run_volumes(&ctx),
        Commands::Streams(args) => inspect::run_streams(&ctx, args),
        Commands::Reparse(args) => inspect::run_reparse(&ctx, args),
        Commands::Capabilities => inspect::run_capabilities(&ctx),
    }
}

fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("strata: failed to install error reporter: {err}");
    }
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Library errors already name the operation, path and OS code.
            eprintln!("strata: {err:#}");
            ExitCode::FAILURE
        }
    }
}
