//! Integration tests for the `hdrcmd` command logic: output text and exit codes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hdrtray::cli::{run, Cli, CliContext};
use hdrtray::platform::{MockDisplayApi, MockFailures, MockOutput};
use hdrtray::startup::{RUN_VALUE_NAME, TRAY_EXE_NAME};
use hdrtray::{Capabilities, LoginStartupConfig, MemoryStore, Platform, SelectionStore, SettingsStore};

struct Harness {
    mock: Arc<MockDisplayApi>,
    selection_backing: MemoryStore,
    startup_backing: MemoryStore,
    ctx: CliContext,
}

impl Harness {
    fn new(test: &str, outputs: Vec<MockOutput>) -> Self {
        let mock = Arc::new(MockDisplayApi::new(outputs));
        let selection_backing = MemoryStore::new();
        let startup_backing = MemoryStore::new();
        let ctx = CliContext {
            platform: Platform::new(mock.clone(), Capabilities::legacy()),
            selection: SelectionStore::new(Arc::new(selection_backing.clone())),
            startup: LoginStartupConfig::new(Arc::new(startup_backing.clone()), scratch_exe(test)),
        };
        Self {
            mock,
            selection_backing,
            startup_backing,
            ctx,
        }
    }

    fn two_displays(test: &str) -> Self {
        Self::new(
            test,
            vec![MockOutput::hdr_monitor(1, "LG OLED"), MockOutput::sdr_monitor(2, "Office")],
        )
    }

    /// Runs `hdrcmd <args>` and returns exit code, stdout and stderr.
    fn run(&self, args: &[&str]) -> (i32, String, String) {
        let cli = Cli::try_parse_from(std::iter::once("hdrcmd").chain(args.iter().copied()))
            .expect("arguments must parse");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(&cli, &self.ctx, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).expect("stdout is utf-8"),
            String::from_utf8(err).expect("stderr is utf-8"),
        )
    }
}

fn scratch_exe(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hdrtray-cli-{}-{test}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let exe = dir.join(TRAY_EXE_NAME);
    std::fs::write(&exe, b"").unwrap();
    exe
}

#[test]
fn test_status_short_and_exit_codes() {
    let harness = Harness::two_displays("status");

    assert_eq!(harness.run(&["status"]), (0, "HDR is off\n".to_string(), String::new()));
    assert_eq!(harness.run(&["status", "-m", "x"]).0, 1);

    harness.run(&["on"]);
    assert_eq!(harness.run(&["status", "--mode", "s"]).1, "HDR is on\n");
    assert_eq!(harness.run(&["status", "-m", "exitcode"]), (0, String::new(), String::new()));
}

#[test]
fn test_status_exit_code_unsupported() {
    let harness = Harness::new("unsupported", vec![MockOutput::sdr_monitor(1, "Office")]);
    assert_eq!(harness.run(&["status", "-m", "x"]).0, 2);
}

#[test]
fn test_status_long_prints_table() {
    let harness = Harness::two_displays("long");

    let (code, out, _) = harness.run(&["status", "-m", "long"]);

    assert_eq!(code, 0);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "HDR is off");
    assert_eq!(lines[1], "");
    assert_eq!(lines[2], "Display #\tName   \tStatus");
    assert_eq!(lines[3], "---------\t-------\t-----------");
    assert_eq!(lines[4], "        0\tLG OLED\toff");
    assert_eq!(lines[5], "        1\tOffice \tunsupported");
    assert_eq!(lines.len(), 6);
}

#[test]
fn test_on_off_exit_codes() {
    let harness = Harness::two_displays("onoff");

    assert_eq!(harness.run(&["on"]).0, 0);
    assert!(harness.mock.outputs()[0].hdr_on);
    assert_eq!(harness.run(&["off"]).0, 0);
    assert!(!harness.mock.outputs()[0].hdr_on);

    // only the SDR monitor: nothing can be changed
    assert_eq!(harness.run(&["on", "-d", "Office"]).0, -1);

    harness.mock.set_failures(MockFailures {
        ignore_set: true,
        ..MockFailures::default()
    });
    assert_eq!(harness.run(&["on", "-d", "0"]).0, 1);
}

#[test]
fn test_on_reports_unresolved_displays() {
    let harness = Harness::new(
        "resolve",
        vec![MockOutput::hdr_monitor(1, "LG Left"), MockOutput::hdr_monitor(2, "LG Right")],
    );

    let (code, _, err) = harness.run(&["on", "-d", "lg", "samsung", "left"]);

    assert_eq!(code, 0);
    assert!(err.contains("Display 'lg' is ambiguous, could be any of: LG Left, LG Right"));
    assert!(err.contains("Couldn't find a display fitting 'samsung'"));
    let outputs = harness.mock.outputs();
    assert!(outputs[0].hdr_on);
    assert!(!outputs[1].hdr_on);
}

#[test]
fn test_on_without_displays_uses_selection() {
    let harness = Harness::new(
        "selection",
        vec![MockOutput::hdr_monitor(1, "Desk"), MockOutput::hdr_monitor(2, "Projector")],
    );

    assert_eq!(harness.run(&["select", "off", "proj"]).0, 0);
    assert_eq!(harness.run(&["on"]).0, 0);

    let outputs = harness.mock.outputs();
    assert!(outputs[0].hdr_on);
    assert!(!outputs[1].hdr_on);
    assert_eq!(
        harness.selection_backing.read_dword("Display.MOCK0002_Projector"),
        Ok(0)
    );
}

#[test]
fn test_select_prints_included_column() {
    let harness = Harness::two_displays("select");

    let (code, out, _) = harness.run(&["select", "off", "1"]);

    assert_eq!(code, 0);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Display #\tName   \tStatus     \tIncluded");
    assert_eq!(lines[2], "        0\tLG OLED\toff        \tyes");
    assert_eq!(lines[3], "        1\tOffice \tunsupported\tno");

    let (_, out, _) = harness.run(&["select", "list"]);
    assert!(out.lines().any(|line| line.ends_with("\tno")));
}

#[test]
fn test_select_without_stable_id_prints_error() {
    let harness = Harness::new(
        "nostable",
        vec![MockOutput::hdr_monitor(1, "Mystery").with_stable_id(None)],
    );

    let (code, out, err) = harness.run(&["select", "off", "Mystery"]);

    assert_eq!(code, 0);
    assert!(err.contains("'Mystery'"));
    assert!(out.lines().any(|line| line.ends_with("\tyes")));
}

#[test]
fn test_select_without_action_prints_help_and_table() {
    let harness = Harness::two_displays("selecthelp");

    let (code, out, _) = harness.run(&["select"]);

    assert_eq!(code, 0);
    assert!(out.contains("list"));
    assert!(out.contains("Display #"));
}

#[test]
fn test_startup_commands() {
    let harness = Harness::two_displays("startup");

    assert_eq!(
        harness.run(&["startup", "status"]).1,
        "'Start when logging in' is OFF\n"
    );
    assert_eq!(
        harness.run(&["startup", "on"]),
        (0, "'Start when logging in' is now ON\n".to_string(), String::new())
    );
    let stored = harness.startup_backing.read_string(RUN_VALUE_NAME).unwrap().unwrap();
    assert!(stored.contains(TRAY_EXE_NAME));

    assert_eq!(harness.run(&["startup", "off"]).1, "'Start when logging in' is now OFF\n");
    assert_eq!(harness.startup_backing.read_string(RUN_VALUE_NAME), Ok(None));
}
