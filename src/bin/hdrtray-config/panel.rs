use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};

use hdrtray::resolve::display_label;
use hdrtray::{hdr, ChangeWatcher, Freshness, LoginStartupConfig, Platform, SelectionStore, Status};

/// Fallback for display changes made while the window keeps focus.
const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct DisplayRow {
    label: String,
    status: Status,
    stable_id: Option<String>,
    included: bool,
}

pub struct ConfigPanel {
    platform: Platform,
    selection: SelectionStore,
    startup: LoginStartupConfig,

    rows: Vec<DisplayRow>,
    status: Status,
    startup_enabled: bool,
    status_message: Option<String>,

    refresh_rx: Option<Receiver<()>>,
    watchers: Vec<ChangeWatcher>,
    last_reload: Instant,
}

impl ConfigPanel {
    pub fn new(platform: Platform, selection: SelectionStore, startup: LoginStartupConfig) -> Self {
        let mut panel = Self {
            platform,
            selection,
            startup,
            rows: Vec::new(),
            status: Status::Unsupported,
            startup_enabled: false,
            status_message: None,
            refresh_rx: None,
            watchers: Vec::new(),
            last_reload: Instant::now(),
        };
        panel.reload();
        panel
    }

    /// Repaints whenever the selection or the login startup value changes elsewhere.
    pub fn start_watchers(&mut self, ctx: &egui::Context) {
        let (tx, rx) = unbounded();

        let (for_selection, selection_ctx) = (tx.clone(), ctx.clone());
        match self.selection.watch(Box::new(move || {
            let _ = for_selection.send(());
            selection_ctx.request_repaint();
        })) {
            Ok(watcher) => self.watchers.push(watcher),
            Err(e) => tracing::warn!("Display selection changes will not be noticed: {}", e),
        }

        let startup_ctx = ctx.clone();
        match self.startup.watch(Box::new(move || {
            let _ = tx.send(());
            startup_ctx.request_repaint();
        })) {
            Ok(watcher) => self.watchers.push(watcher),
            Err(e) => tracing::warn!("Login startup changes will not be noticed: {}", e),
        }

        self.refresh_rx = Some(rx);
    }

    fn reload(&mut self) {
        let displays = hdr::get_displays(&self.platform);
        self.rows = displays
            .iter()
            .map(|display| {
                let stable_id = display.stable_id().ok();
                DisplayRow {
                    label: display_label(display),
                    status: display
                        .status(Freshness::Cached)
                        .unwrap_or(Status::Unsupported),
                    included: stable_id
                        .as_deref()
                        .map_or(true, |stable_id| self.selection.is_enabled(stable_id)),
                    stable_id,
                }
            })
            .collect();

        self.status = hdr::get_aggregate_status(&hdr::get_enabled_displays(&self.platform, &self.selection));
        self.startup_enabled = self.startup.is_enabled().unwrap_or_else(|e| {
            tracing::warn!("Could not read login startup state: {}", e);
            false
        });
        self.last_reload = Instant::now();
    }

    fn set_hdr(&mut self, enable: bool) {
        let displays = hdr::get_enabled_displays(&self.platform, &self.selection);
        match hdr::set_aggregate_status(&displays, enable) {
            Some(status) => {
                tracing::info!("HDR is now {}", status);
                self.status_message = None;
            }
            None => {
                tracing::warn!("Switching HDR failed");
                self.status_message = Some("Switching HDR failed".to_string());
            }
        }
        self.reload();
    }

    fn set_included(&mut self, row: usize, included: bool) {
        let Some(DisplayRow { label, stable_id: Some(stable_id), .. }) = self.rows.get(row).cloned() else {
            return;
        };
        if let Err(e) = self.selection.set_enabled_flag(&stable_id, included) {
            tracing::warn!("Could not store selection for '{}': {}", label, e);
            self.status_message = Some(format!(
                "Could not store selection for display '{}': error {}",
                label,
                e.code()
            ));
        }
        self.reload();
    }

    fn set_startup(&mut self, enable: bool) {
        if let Err(e) = self.startup.set_enabled(enable) {
            tracing::warn!("Could not change login startup state: {}", e);
            self.status_message = Some(format!("Could not change login startup state, error {}", e.code()));
        }
        self.reload();
    }
}

impl eframe::App for ConfigPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.style_mut(|style| {
            style.interaction.selectable_labels = false;
        });

        let notified = self
            .refresh_rx
            .as_ref()
            .is_some_and(|rx| rx.try_iter().count() > 0);
        let focused = ctx.input(|i| i.events.iter().any(|e| matches!(e, egui::Event::WindowFocused(true))));
        if notified || focused || self.last_reload.elapsed() >= POLL_INTERVAL {
            self.reload();
        }
        ctx.request_repaint_after(POLL_INTERVAL);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("HDRTray");
                let version = env!("CARGO_PKG_VERSION").strip_prefix("0.").unwrap_or(env!("CARGO_PKG_VERSION"));
                ui.label(egui::RichText::new(version).size(10.0).color(egui::Color32::from_rgb(140, 140, 140)));
            });
            ui.add_space(10.0);

            let mut hdr_on = self.status == Status::On;
            let label = if self.status.is_supported() { "Use HDR" } else { "Use HDR (not supported)" };
            if ui
                .add_enabled(self.status.is_supported(), egui::Checkbox::new(&mut hdr_on, label))
                .changed()
            {
                self.set_hdr(hdr_on);
            }

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.label("Displays included in HDR toggling:");
            ui.add_space(5.0);

            let mut include_changed = None;
            egui::Grid::new("display_grid")
                .num_columns(3)
                .spacing([20.0, 8.0])
                .striped(true)
                .show(ui, |ui| {
                    ui.strong("Display");
                    ui.strong("HDR");
                    ui.strong("Include");
                    ui.end_row();

                    for (idx, row) in self.rows.iter().enumerate() {
                        ui.label(&row.label);
                        ui.label(if row.status.is_supported() { "available" } else { "not available" });

                        let mut included = row.included;
                        let checkbox = ui
                            .add_enabled(row.stable_id.is_some(), egui::Checkbox::without_text(&mut included))
                            .on_disabled_hover_text("This display can't be identified reliably");
                        if checkbox.changed() {
                            include_changed = Some((idx, included));
                        }
                        ui.end_row();
                    }
                });
            if let Some((row, included)) = include_changed {
                self.set_included(row, included);
            }

            if self.rows.is_empty() {
                ui.label("No active displays found");
            }

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            let mut startup_enabled = self.startup_enabled;
            if ui.checkbox(&mut startup_enabled, "Start when logging in").changed() {
                self.set_startup(startup_enabled);
            }

            if let Some(ref msg) = self.status_message {
                ui.add_space(10.0);
                ui.colored_label(egui::Color32::from_rgb(230, 120, 100), msg);
            }
        });
    }
}
