//! `hdrcmd`: switch "Use HDR" and edit the display selection from a console.

use std::io::{self, Write};

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::display::DisplayInfo;
use crate::hdr;
use crate::platform::Platform;
use crate::resolve::{self, display_label};
use crate::selection::SelectionStore;
use crate::startup::LoginStartupConfig;
use crate::status::{Freshness, Status};

#[derive(Debug, Parser)]
#[command(name = "hdrcmd", version, about = "HDRCmd - enable/disable \"Use HDR\" from command line")]
pub struct Cli {
    /// Print diagnostic messages to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print current HDR status
    Status {
        /// How to report status: (s)hort, (l)ong or e(x)itcode
        #[arg(short, long, value_name = "MODE", default_value = "short", value_parser = parse_status_mode)]
        mode: StatusMode,
    },
    /// Turn HDR on
    On(DisplayArgs),
    /// Turn HDR off
    Off(DisplayArgs),
    /// Select displays to include in HDR toggling
    Select {
        #[command(subcommand)]
        action: Option<SelectAction>,
    },
    /// Change 'Start when logging in'
    Startup {
        #[command(subcommand)]
        action: Option<StartupAction>,
    },
}

#[derive(Debug, Args)]
pub struct DisplayArgs {
    /// Displays to consider, by number or name. Defaults to the displays included in toggling.
    #[arg(short, long = "displays", value_name = "# or NAME", num_args = 1..)]
    pub displays: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum SelectAction {
    /// Print list of displays
    List,
    /// Include displays in HDR toggling
    On {
        #[arg(required = true, value_name = "DISPLAY")]
        displays: Vec<String>,
    },
    /// Exclude displays from HDR toggling
    Off {
        #[arg(required = true, value_name = "DISPLAY")]
        displays: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum StartupAction {
    /// Print current status of option
    Status,
    /// Turn 'Start when logging in' on
    On,
    /// Turn 'Start when logging in' off
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Short,
    Long,
    ExitCode,
}

/// Accepts any prefix of `short`, `long` or `exitcode`, and `x`.
pub fn parse_status_mode(text: &str) -> Result<StatusMode, String> {
    let item = text.to_lowercase().replace('_', "");
    if "short".starts_with(&item) {
        Ok(StatusMode::Short)
    } else if "long".starts_with(&item) {
        Ok(StatusMode::Long)
    } else if "exitcode".starts_with(&item) || item == "x" {
        Ok(StatusMode::ExitCode)
    } else {
        Err(format!(
            "\"{}\" not in (s)hort,(l)ong,e(x)itcode (abbreviation is allowed)",
            item
        ))
    }
}

/// Everything the commands act on.
pub struct CliContext {
    pub platform: Platform,
    pub selection: SelectionStore,
    pub startup: LoginStartupConfig,
}

/// Runs one parsed command and returns the process exit code.
pub fn run(cli: &Cli, ctx: &CliContext, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    match run_command(&cli.command, ctx, out, err) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("failed to write output: {}", e);
            -1
        }
    }
}

fn run_command(command: &Command, ctx: &CliContext, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<i32> {
    match command {
        Command::Status { mode } => status(*mode, ctx, out),
        Command::On(args) => set_status(true, &args.displays, ctx, err),
        Command::Off(args) => set_status(false, &args.displays, ctx, err),
        Command::Select { action } => select(action.as_ref(), ctx, out, err),
        Command::Startup { action } => startup(*action, ctx, out),
    }
}

fn enabled_status(ctx: &CliContext) -> Status {
    hdr::get_aggregate_status(&hdr::get_enabled_displays(&ctx.platform, &ctx.selection))
}

fn status(mode: StatusMode, ctx: &CliContext, out: &mut dyn Write) -> io::Result<i32> {
    match mode {
        StatusMode::Short => {
            writeln!(out, "HDR is {}", enabled_status(ctx))?;
            Ok(0)
        }
        StatusMode::Long => {
            writeln!(out, "HDR is {}", enabled_status(ctx))?;
            writeln!(out)?;
            print_display_table(&hdr::get_displays(&ctx.platform), None, out)?;
            Ok(0)
        }
        StatusMode::ExitCode => Ok(match enabled_status(ctx) {
            Status::On => 0,
            Status::Off => 1,
            Status::Unsupported => 2,
        }),
    }
}

fn set_status(enable: bool, names: &[String], ctx: &CliContext, err: &mut dyn Write) -> io::Result<i32> {
    let (displays, problems) = resolve::select_displays(&ctx.platform, &ctx.selection, names);
    for problem in &problems {
        writeln!(err, "{}", problem)?;
    }

    let requested = if enable { Status::On } else { Status::Off };
    Ok(match hdr::set_aggregate_status(&displays, enable) {
        None => -1,
        Some(reached) if reached == requested => 0,
        Some(_) => 1,
    })
}

fn select(action: Option<&SelectAction>, ctx: &CliContext, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<i32> {
    let mut result = 0;
    match action {
        None => print_subcommand_help("select", out)?,
        Some(SelectAction::List) => {}
        Some(SelectAction::On { displays }) => result = store_selection(displays, true, ctx, err)?,
        Some(SelectAction::Off { displays }) => result = store_selection(displays, false, ctx, err)?,
    }

    print_display_table(&hdr::get_displays(&ctx.platform), Some(&ctx.selection), out)?;
    Ok(result)
}

/// Returns the code of the first failed write, or 0.
fn store_selection(names: &[String], flag: bool, ctx: &CliContext, err: &mut dyn Write) -> io::Result<i32> {
    let all = hdr::get_displays(&ctx.platform);
    let (displays, problems) = resolve::resolve_all(&all, names);
    for problem in &problems {
        writeln!(err, "{}", problem)?;
    }

    let mut result = None;
    for display in displays {
        let stable_id = match display.stable_id() {
            Ok(stable_id) => stable_id,
            Err(e) => {
                writeln!(err, "Could not identify display '{}': {}", display_label(display), e)?;
                continue;
            }
        };
        if let Err(e) = ctx.selection.set_enabled_flag(&stable_id, flag) {
            writeln!(
                err,
                "Could not store selection for display '{}': error {}",
                display_label(display),
                e.code()
            )?;
            result.get_or_insert(e.code());
        }
    }
    Ok(result.unwrap_or(0))
}

fn startup(action: Option<StartupAction>, ctx: &CliContext, out: &mut dyn Write) -> io::Result<i32> {
    let change = match action {
        Some(StartupAction::On) => Some(true),
        Some(StartupAction::Off) => Some(false),
        Some(StartupAction::Status) => None,
        None => {
            print_subcommand_help("startup", out)?;
            None
        }
    };

    if let Some(enable) = change {
        if let Err(e) = ctx.startup.set_enabled(enable) {
            writeln!(out, "Could not change login startup state, error {}", e.code())?;
            return Ok(e.code());
        }
    }

    match ctx.startup.is_enabled() {
        Ok(enabled) => {
            let state = if enabled { "ON" } else { "OFF" };
            let now = if change.is_some() { "now " } else { "" };
            writeln!(out, "'Start when logging in' is {}{}", now, state)?;
            Ok(0)
        }
        Err(e) => {
            writeln!(out, "Could not get login startup state, error {}", e.code())?;
            Ok(e.code())
        }
    }
}

fn print_subcommand_help(name: &str, out: &mut dyn Write) -> io::Result<()> {
    let mut command = Cli::command();
    command.build();
    if let Some(sub) = command.find_subcommand_mut(name) {
        writeln!(out, "{}", sub.render_help())?;
    }
    Ok(())
}

/// Tab-separated table of all displays whose name and status are known.
///
/// With a selection store, an "Included" column shows the toggling selection.
pub fn print_display_table(
    displays: &[DisplayInfo],
    selection: Option<&SelectionStore>,
    out: &mut dyn Write,
) -> io::Result<()> {
    let rows: Vec<Vec<String>> = displays
        .iter()
        .filter_map(|display| {
            let name = display.name().ok()?;
            let status = display.status(Freshness::Cached).ok()?;
            let mut row = vec![display.index().to_string(), name, status.to_string()];
            if let Some(selection) = selection {
                let included = display
                    .stable_id()
                    .map(|stable_id| selection.is_enabled(&stable_id))
                    .unwrap_or(true);
                row.push(if included { "yes" } else { "no" }.to_string());
            }
            Some(row)
        })
        .collect();

    let mut headings = vec!["Display #", "Name", "Status"];
    if selection.is_some() {
        headings.push("Included");
    }

    let mut widths: Vec<usize> = headings.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let heading: Vec<String> = headings
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = w))
        .collect();
    writeln!(out, "{}", heading.join("\t").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("\t"))?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(column, (cell, w))| {
                if column == 0 {
                    format!("{:>w$}", cell, w = w)
                } else {
                    format!("{:<w$}", cell, w = w)
                }
            })
            .collect();
        writeln!(out, "{}", cells.join("\t").trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mode_abbreviations() {
        assert_eq!(parse_status_mode("s"), Ok(StatusMode::Short));
        assert_eq!(parse_status_mode("LONG"), Ok(StatusMode::Long));
        assert_eq!(parse_status_mode("l"), Ok(StatusMode::Long));
        assert_eq!(parse_status_mode("x"), Ok(StatusMode::ExitCode));
        assert_eq!(parse_status_mode("exit_code"), Ok(StatusMode::ExitCode));
        assert_eq!(parse_status_mode("e"), Ok(StatusMode::ExitCode));
        assert!(parse_status_mode("verbose").is_err());
    }

    #[test]
    fn parses_commands() {
        let cli = Cli::try_parse_from(["hdrcmd", "status", "-m", "x"]).unwrap();
        assert!(matches!(cli.command, Command::Status { mode: StatusMode::ExitCode }));

        let cli = Cli::try_parse_from(["hdrcmd", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status { mode: StatusMode::Short }));

        let cli = Cli::try_parse_from(["hdrcmd", "on", "-d", "0", "LG"]).unwrap();
        match cli.command {
            Command::On(args) => assert_eq!(args.displays, vec!["0", "LG"]),
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["hdrcmd", "select", "off", "Projector"]).unwrap();
        assert!(matches!(cli.command, Command::Select { action: Some(SelectAction::Off { .. }) }));

        assert!(Cli::try_parse_from(["hdrcmd", "select", "on"]).is_err());
        assert!(Cli::try_parse_from(["hdrcmd"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
