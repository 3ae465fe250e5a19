//! HDRCmd - enable/disable "Use HDR" from the command line.
//!
//! # Usage
//!
//! ```text
//! hdrcmd status [-m short|long|exitcode]
//! hdrcmd on  [-d DISPLAY...]
//! hdrcmd off [-d DISPLAY...]
//! hdrcmd select [list | on DISPLAY... | off DISPLAY...]
//! hdrcmd startup [status | on | off]
//! ```
//!
//! `DISPLAY` is either the number shown by `hdrcmd select list` or (part of) the display name.
//! Diagnostics go to stderr; `--verbose` or `HDRTRAY_LOG` raise the level.

use clap::Parser;
use hdrtray::cli::Cli;

#[cfg(windows)]
fn context() -> anyhow::Result<hdrtray::cli::CliContext> {
    use anyhow::Context;

    Ok(hdrtray::cli::CliContext {
        platform: hdrtray::Platform::system(),
        selection: hdrtray::SelectionStore::open_default(),
        startup: hdrtray::LoginStartupConfig::open_default()
            .context("Failed to locate the tray executable")?,
    })
}

#[cfg(not(windows))]
fn context() -> anyhow::Result<hdrtray::cli::CliContext> {
    anyhow::bail!("hdrcmd only works on Windows")
}

fn main() {
    let cli = Cli::parse();
    hdrtray::logger::init_cli_logging(cli.verbose);

    let ctx = match context() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(-1);
        }
    };

    let code = hdrtray::cli::run(&cli, &ctx, &mut std::io::stdout(), &mut std::io::stderr());
    std::process::exit(code);
}
