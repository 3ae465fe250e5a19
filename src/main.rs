#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod tray;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let result = tray::run_app();
    let _ = hdrtray::logger::finalize_logs();
    result
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("hdrtray only runs on Windows")
}
