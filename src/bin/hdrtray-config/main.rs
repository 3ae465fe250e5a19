#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod panel;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let result = run_app();
    let _ = hdrtray::logger::finalize_logs();
    result
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("hdrtray-config only runs on Windows")
}

#[cfg(windows)]
fn run_app() -> anyhow::Result<()> {
    use anyhow::Context;
    use hdrtray::{LoginStartupConfig, Platform, RuntimeSettings, SelectionStore};

    let settings = RuntimeSettings::from_env()?;
    hdrtray::logger::init_logging(&settings, "hdrtray-config")?;
    tracing::info!("=== HDRTray configuration starting ===");

    let mut panel = panel::ConfigPanel::new(
        Platform::system(),
        SelectionStore::open_default(),
        LoginStartupConfig::open_default().context("Failed to locate tray executable")?,
    );

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 360.0])
            .with_min_inner_size([320.0, 240.0])
            .with_icon(load_window_icon()),
        run_and_return: true,
        ..Default::default()
    };

    eframe::run_native(
        "HDRTray Settings",
        native_options,
        Box::new(move |cc| {
            panel.start_watchers(&cc.egui_ctx);
            Ok(Box::new(panel))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Settings window error: {}", e))?;

    tracing::info!("Settings window closed");
    Ok(())
}

#[cfg(windows)]
fn load_window_icon() -> egui::IconData {
    let icon_path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("hdr_on.ico")));

    if let Some(path) = icon_path.filter(|path| path.exists()) {
        match image::open(&path) {
            Ok(image) => {
                let rgba = image.to_rgba8();
                let (width, height) = rgba.dimensions();
                return egui::IconData {
                    rgba: rgba.into_raw(),
                    width,
                    height,
                };
            }
            Err(e) => tracing::warn!("Failed to load window icon from {:?}: {}", path, e),
        }
    }

    let mut rgba = Vec::with_capacity(32 * 32 * 4);
    for _ in 0..32 * 32 {
        rgba.extend_from_slice(&[255, 200, 60, 255]);
    }

    egui::IconData {
        rgba,
        width: 32,
        height: 32,
    }
}
