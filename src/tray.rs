use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use windows::core::w;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos, PeekMessageW, RegisterClassW,
    SetCursorPos, TranslateMessage, MSG, PM_REMOVE, WINDOW_EX_STYLE, WM_DISPLAYCHANGE, WM_QUIT, WNDCLASSW,
    WS_OVERLAPPED,
};

use hdrtray::{hdr, ChangeWatcher, LoginStartupConfig, Platform, RuntimeSettings, SelectionStore, Status};

/// Fallback for changes that arrive without a WM_DISPLAYCHANGE, such as HDR switched in Settings.
const POLL_INTERVAL: Duration = Duration::from_secs(60);
/// HDR state settles some time after WM_DISPLAYCHANGE, so it is checked again a few times.
const RECHECK_INTERVAL: Duration = Duration::from_millis(500);
const RECHECK_COUNT: u32 = 10;
const CONFIG_EXE_NAME: &str = "hdrtray-config.exe";

#[derive(Debug)]
enum AppCommand {
    ToggleHdr,
    ToggleStartup,
    OpenConfig,
    Refresh,
    DisplayChanged,
    Exit,
}

type Wakeup = Arc<(Mutex<()>, Condvar)>;

/// Hands commands from event handlers and watcher threads to the main loop.
#[derive(Clone)]
struct CommandSender {
    tx: Sender<AppCommand>,
    wakeup: Wakeup,
}

impl CommandSender {
    fn send(&self, command: AppCommand) {
        if let Err(e) = self.tx.send(command) {
            tracing::debug!("Main loop is gone, dropped {:?}", e.into_inner());
            return;
        }
        self.wakeup.1.notify_one();
    }
}

static DISPLAY_CHANGE_SENDER: Mutex<Option<CommandSender>> = parking_lot::const_mutex(None);

/// Hidden top-level window receiving the WM_DISPLAYCHANGE broadcast.
///
/// Message-only windows do not get broadcasts, so this one is a regular window that is never shown.
struct DisplayChangeWindow {
    hwnd: HWND,
}

impl DisplayChangeWindow {
    fn create(sender: &CommandSender) -> Result<Self> {
        *DISPLAY_CHANGE_SENDER.lock() = Some(sender.clone());

        unsafe {
            let class_name = w!("HDRTrayDisplayChange");
            let hinstance = GetModuleHandleW(None)?;

            let wc = WNDCLASSW {
                lpfnWndProc: Some(display_change_proc),
                hInstance: hinstance.into(),
                lpszClassName: class_name,
                ..Default::default()
            };
            RegisterClassW(&wc);

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                class_name,
                w!("HDRTray"),
                WS_OVERLAPPED,
                0, 0, 0, 0,
                None, None,
                Some(HINSTANCE(hinstance.0)),
                None,
            )
            .context("Failed to create display change window")?;

            Ok(Self { hwnd })
        }
    }
}

impl Drop for DisplayChangeWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            tracing::debug!("DestroyWindow failed: {}", e);
        }
        DISPLAY_CHANGE_SENDER.lock().take();
    }
}

unsafe extern "system" fn display_change_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_DISPLAYCHANGE {
        tracing::debug!("WM_DISPLAYCHANGE received");
        if let Some(sender) = DISPLAY_CHANGE_SENDER.lock().as_ref() {
            sender.send(AppCommand::DisplayChanged);
        }
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Schedule of status re-checks after a display change.
#[derive(Debug, Clone, Copy)]
struct Recheck {
    remaining: u32,
    next: Instant,
}

impl Recheck {
    fn start(now: Instant) -> Self {
        Self {
            remaining: RECHECK_COUNT,
            next: now + RECHECK_INTERVAL,
        }
    }

    /// Whether a re-check is due at `now`; schedules the one after it.
    fn due(&mut self, now: Instant) -> bool {
        if self.remaining == 0 || now < self.next {
            return false;
        }
        self.remaining -= 1;
        self.next = now + RECHECK_INTERVAL;
        true
    }

    fn finished(&self) -> bool {
        self.remaining == 0
    }
}

struct App {
    platform: Platform,
    selection: SelectionStore,
    startup: LoginStartupConfig,
    last_error: Option<String>,
}

impl App {
    fn new() -> Result<Self> {
        let platform = Platform::system();
        tracing::info!("Platform capabilities: {:?}", platform.capabilities());

        Ok(Self {
            platform,
            selection: SelectionStore::open_default(),
            startup: LoginStartupConfig::open_default().context("Failed to locate tray executable")?,
            last_error: None,
        })
    }

    fn status(&self) -> Status {
        hdr::get_aggregate_status(&hdr::get_enabled_displays(&self.platform, &self.selection))
    }

    fn startup_enabled(&self) -> bool {
        self.startup.is_enabled().unwrap_or_else(|e| {
            tracing::warn!("Could not read login startup state: {}", e);
            false
        })
    }

    fn toggle_hdr(&mut self) {
        // Switching HDR makes the desktop re-layout, which moves the cursor.
        let cursor = cursor_position();

        let displays = hdr::get_enabled_displays(&self.platform, &self.selection);
        match hdr::toggle_aggregate_status(&displays) {
            None => {
                tracing::warn!("HDR toggle failed on {} display(s)", displays.len());
                self.last_error = Some("Switching HDR failed".to_string());
            }
            Some(Status::Unsupported) => {
                tracing::info!("No HDR capable display selected, nothing to toggle");
                self.last_error = None;
            }
            Some(status) => {
                tracing::info!("HDR is now {}", status);
                self.last_error = None;
            }
        }

        if let Some(point) = cursor {
            let _ = unsafe { SetCursorPos(point.x, point.y) };
        }
    }

    fn toggle_startup(&mut self) {
        let enable = !self.startup_enabled();
        match self.startup.set_enabled(enable) {
            Ok(()) => {
                tracing::info!("'Start when logging in' set to {}", enable);
                self.last_error = None;
            }
            Err(e) => {
                tracing::warn!("Could not change login startup state: {}", e);
                self.last_error = Some(format!("Could not change login startup state, error {}", e.code()));
            }
        }
    }

    fn open_config(&mut self) {
        let exe = self.startup.exe().with_file_name(CONFIG_EXE_NAME);
        match std::process::Command::new(&exe).spawn() {
            Ok(_) => tracing::info!("Launched {}", exe.display()),
            Err(e) => {
                tracing::warn!("Failed to launch {}: {}", exe.display(), e);
                self.last_error = Some(format!("Could not start {}", CONFIG_EXE_NAME));
            }
        }
    }
}

fn cursor_position() -> Option<POINT> {
    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point) }.ok().map(|_| point)
}

fn tooltip_text(status: Status, last_error: Option<&str>) -> String {
    let mut text = format!("HDR is {}", status);
    if let Some(error) = last_error {
        text.push('\n');
        text.push_str(error);
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Shown {
    status: Status,
    startup: bool,
    tooltip: String,
}

struct TrayUi {
    tray_icon: TrayIcon,
    hdr_item: CheckMenuItem,
    startup_item: CheckMenuItem,
    icon_on: Icon,
    icon_off: Icon,
    shown: Option<Shown>,
}

impl TrayUi {
    /// Returns whether the HDR status differs from what was shown before.
    fn update(&mut self, app: &App) -> bool {
        let status = app.status();
        let next = Shown {
            status,
            startup: app.startup_enabled(),
            tooltip: tooltip_text(status, app.last_error.as_deref()),
        };

        // Check items flip themselves on click, so always reassert them.
        self.hdr_item.set_checked(next.status == Status::On);
        self.startup_item.set_checked(next.startup);

        if self.shown.as_ref() == Some(&next) {
            return false;
        }
        let status_changed = self.shown.as_ref().map(|shown| shown.status) != Some(next.status);

        let supported = next.status.is_supported();
        self.hdr_item.set_enabled(supported);
        self.hdr_item
            .set_text(if supported { "HDR enabled" } else { "HDR not supported" });

        let icon = if next.status == Status::On { &self.icon_on } else { &self.icon_off };
        if let Err(e) = self.tray_icon.set_icon(Some(icon.clone())) {
            tracing::warn!("Failed to update tray icon: {}", e);
        }
        self.tray_icon.set_tooltip(Some(&next.tooltip)).ok();

        tracing::debug!("Tray shows {:?}", next);
        self.shown = Some(next);
        status_changed
    }
}

fn start_watchers(app: &App, sender: &CommandSender) -> Vec<ChangeWatcher> {
    let mut watchers = Vec::new();

    let for_selection = sender.clone();
    match app
        .selection
        .watch(Box::new(move || for_selection.send(AppCommand::Refresh)))
    {
        Ok(watcher) => watchers.push(watcher),
        Err(e) => tracing::warn!("Display selection changes will not be noticed: {}", e),
    }

    let for_startup = sender.clone();
    match app
        .startup
        .watch(Box::new(move || for_startup.send(AppCommand::Refresh)))
    {
        Ok(watcher) => watchers.push(watcher),
        Err(e) => tracing::warn!("Login startup changes will not be noticed: {}", e),
    }

    watchers
}

pub fn run_app() -> Result<()> {
    let settings = RuntimeSettings::from_env()?;
    hdrtray::logger::init_logging(&settings, "hdrtray")?;

    tracing::info!("=== HDRTray Starting ===");

    let mut app = App::new()?;
    let (command_tx, command_rx): (Sender<AppCommand>, Receiver<AppCommand>) = unbounded();
    let sender = CommandSender {
        tx: command_tx,
        wakeup: Arc::new((Mutex::new(()), Condvar::new())),
    };

    tracing::info!("Loading tray icons");
    let icon_on = load_icon("hdr_on.ico", [255, 200, 60])?;
    let icon_off = load_icon("hdr_off.ico", [128, 128, 128])?;

    let menu = Menu::new();
    let hdr_item = CheckMenuItem::new("HDR enabled", true, false, None);
    let startup_item = CheckMenuItem::new("Start when logging in", true, false, None);
    let config_item = MenuItem::new("Configure displays...", true, None);
    let exit_item = MenuItem::new("Exit", true, None);

    menu.append(&hdr_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&startup_item)?;
    menu.append(&config_item)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&exit_item)?;

    let hdr_id = hdr_item.id().clone();
    let startup_id = startup_item.id().clone();
    let config_id = config_item.id().clone();
    let exit_id = exit_item.id().clone();

    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_menu_on_left_click(false)
        .with_tooltip("HDRTray")
        .with_icon(icon_off.clone())
        .build()
        .context("Failed to create notification icon")?;

    let mut ui = TrayUi {
        tray_icon,
        hdr_item,
        startup_item,
        icon_on,
        icon_off,
        shown: None,
    };
    ui.update(&app);
    tracing::info!("Tray icon created");

    let for_click = sender.clone();
    TrayIconEvent::set_event_handler(Some(move |event| {
        if let TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } = event
        {
            tracing::debug!("Tray icon clicked");
            for_click.send(AppCommand::ToggleHdr);
        }
    }));

    let for_menu = sender.clone();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if event.id == hdr_id {
            for_menu.send(AppCommand::ToggleHdr);
        } else if event.id == startup_id {
            for_menu.send(AppCommand::ToggleStartup);
        } else if event.id == config_id {
            for_menu.send(AppCommand::OpenConfig);
        } else if event.id == exit_id {
            tracing::info!("Exit clicked");
            for_menu.send(AppCommand::Exit);
        }
    }));

    let _watchers = start_watchers(&app, &sender);
    let _display_window = match DisplayChangeWindow::create(&sender) {
        Ok(window) => Some(window),
        Err(e) => {
            tracing::warn!("Display changes will only be noticed by polling: {:#}", e);
            None
        }
    };

    tracing::info!("Entering main event loop");
    let mut last_poll = Instant::now();
    let mut recheck: Option<Recheck> = None;

    loop {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    tracing::info!("WM_QUIT received, exiting");
                    return Ok(());
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        let mut changed = false;
        let mut display_changed = false;
        while let Ok(command) = command_rx.try_recv() {
            tracing::debug!("Handling {:?}", command);
            match command {
                AppCommand::ToggleHdr => app.toggle_hdr(),
                AppCommand::ToggleStartup => app.toggle_startup(),
                AppCommand::OpenConfig => app.open_config(),
                AppCommand::Refresh => {}
                AppCommand::DisplayChanged => display_changed = true,
                AppCommand::Exit => {
                    tracing::info!("Exit command - shutting down");
                    return Ok(());
                }
            }
            changed = true;
        }

        let now = Instant::now();
        let status_changed = if changed || now.duration_since(last_poll) >= POLL_INTERVAL {
            last_poll = now;
            ui.update(&app)
        } else {
            false
        };

        if display_changed {
            recheck = (!status_changed).then(|| Recheck::start(now));
        } else if let Some(mut burst) = recheck.take() {
            let settled = burst.due(now) && ui.update(&app);
            if !settled && !burst.finished() {
                recheck = Some(burst);
            }
        }

        let mut guard = sender.wakeup.0.lock();
        sender.wakeup.1.wait_for(&mut guard, Duration::from_millis(100));
    }
}

fn load_icon(file_name: &str, fallback_rgb: [u8; 3]) -> Result<Icon> {
    let icon_path = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Failed to get parent directory"))?
        .join(file_name);

    if icon_path.exists() {
        match Icon::from_path(&icon_path, Some((32, 32))) {
            Ok(icon) => {
                tracing::info!("Loaded icon from {:?}", icon_path);
                return Ok(icon);
            }
            Err(e) => {
                tracing::warn!("Failed to load icon from {:?}: {}. Using fallback.", icon_path, e);
            }
        }
    } else {
        tracing::warn!("Icon file not found at {:?}. Using fallback.", icon_path);
    }

    let [r, g, b] = fallback_rgb;
    let mut rgba = Vec::with_capacity(16 * 16 * 4);
    for _ in 0..16 * 16 {
        rgba.extend_from_slice(&[r, g, b, 255]);
    }

    Icon::from_rgba(rgba, 16, 16).map_err(|e| anyhow::anyhow!("Failed to create fallback icon: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recheck_runs_at_interval_until_exhausted() {
        let start = Instant::now();
        let mut recheck = Recheck::start(start);

        assert!(!recheck.due(start));
        assert!(!recheck.due(start + RECHECK_INTERVAL / 2));

        let mut now = start;
        for _ in 0..RECHECK_COUNT {
            now += RECHECK_INTERVAL;
            assert!(recheck.due(now));
            assert!(!recheck.due(now));
        }

        assert!(recheck.finished());
        assert!(!recheck.due(now + RECHECK_INTERVAL * 10));
    }

    #[test]
    fn recheck_reschedules_from_when_it_ran() {
        let start = Instant::now();
        let mut recheck = Recheck::start(start);

        let late = start + RECHECK_INTERVAL * 3;
        assert!(recheck.due(late));
        assert!(!recheck.due(late + RECHECK_INTERVAL / 2));
        assert!(recheck.due(late + RECHECK_INTERVAL));
        assert!(!recheck.finished());
    }

    #[test]
    fn send_after_main_loop_exit_is_dropped() {
        let (tx, rx) = unbounded();
        let sender = CommandSender {
            tx,
            wakeup: Arc::new((Mutex::new(()), Condvar::new())),
        };

        for _ in 0..64 {
            sender.send(AppCommand::Refresh);
        }
        assert_eq!(rx.len(), 64);

        drop(rx);
        sender.send(AppCommand::Exit);
    }

    #[test]
    fn tooltip_carries_last_error() {
        assert_eq!(tooltip_text(Status::On, None), "HDR is on");
        assert_eq!(
            tooltip_text(Status::Off, Some("Switching HDR failed")),
            "HDR is off\nSwitching HDR failed"
        );
    }
}
