pub mod cached;
pub mod cli;
pub mod display;
pub mod display_id;
pub mod error;
pub mod hdr;
pub mod logger;
pub mod platform;
pub mod resolve;
pub mod selection;
pub mod settings;
pub mod startup;
pub mod status;
pub mod store;
pub mod watcher;

pub use display::DisplayInfo;
pub use display_id::{AdapterId, DisplayId};
pub use error::{HdrError, Result};
pub use hdr::{get_aggregate_status, get_displays, get_enabled_displays, set_aggregate_status, toggle_aggregate_status};
pub use platform::{Capabilities, DisplayApi, Platform};
pub use selection::SelectionStore;
pub use settings::RuntimeSettings;
pub use startup::LoginStartupConfig;
pub use status::{Freshness, Status};
pub use store::{MemoryStore, SettingsStore};
pub use watcher::{ChangeCallback, ChangeWatcher};
