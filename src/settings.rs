use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const APP_DIR_NAME: &str = "HDRTray";
pub const LOG_FILTER_VAR: &str = "HDRTRAY_LOG";
pub const LOG_RETENTION_VAR: &str = "HDRTRAY_LOG_RETENTION";
pub const STREAM_LOGS_VAR: &str = "HDRTRAY_STREAM_LOGS";
pub const STREAM_LOGS_FLAG: &str = "--stream-logs";

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_LOG_RETENTION: usize = 10;

/// Process settings of the tray and the configuration panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub app_data_dir: PathBuf,
    pub log_filter: String,
    pub log_retention_count: usize,
    pub stream_logs: bool,
}

impl RuntimeSettings {
    /// Reads the settings from the process environment and command line.
    pub fn from_env() -> Result<Self> {
        let stream_flag = std::env::args().any(|arg| arg == STREAM_LOGS_FLAG);
        Self::from_lookup(|name| std::env::var(name).ok(), stream_flag)
    }

    pub fn from_lookup<F>(lookup: F, stream_flag: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_data = lookup("APPDATA").context("Failed to get APPDATA environment variable")?;

        let log_filter = lookup(LOG_FILTER_VAR)
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_retention_count = match lookup(LOG_RETENTION_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number, got {:?}", LOG_RETENTION_VAR, raw))?,
            None => DEFAULT_LOG_RETENTION,
        };

        let stream_logs = stream_flag
            || match lookup(STREAM_LOGS_VAR).as_deref().map(str::trim) {
                None | Some("") | Some("0") => false,
                Some("1") => true,
                Some(other) => bail!("{} must be 0 or 1, got {:?}", STREAM_LOGS_VAR, other),
            };

        Ok(Self {
            app_data_dir: PathBuf::from(app_data).join(APP_DIR_NAME),
            log_filter,
            log_retention_count,
            stream_logs,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.app_data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let settings = RuntimeSettings::from_lookup(lookup(&[("APPDATA", "C:\\Users\\u\\AppData\\Roaming")]), false).unwrap();

        assert_eq!(settings.app_data_dir, PathBuf::from("C:\\Users\\u\\AppData\\Roaming").join("HDRTray"));
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.log_retention_count, 10);
        assert!(!settings.stream_logs);
        assert!(settings.log_dir().ends_with("logs"));
    }

    #[test]
    fn overrides() {
        let settings = RuntimeSettings::from_lookup(
            lookup(&[
                ("APPDATA", "/tmp/appdata"),
                (LOG_FILTER_VAR, "hdrtray=debug"),
                (LOG_RETENTION_VAR, " 3 "),
                (STREAM_LOGS_VAR, "1"),
            ]),
            false,
        )
        .unwrap();

        assert_eq!(settings.log_filter, "hdrtray=debug");
        assert_eq!(settings.log_retention_count, 3);
        assert!(settings.stream_logs);
    }

    #[test]
    fn flag_enables_streaming() {
        let settings = RuntimeSettings::from_lookup(lookup(&[("APPDATA", "/tmp")]), true).unwrap();
        assert!(settings.stream_logs);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(RuntimeSettings::from_lookup(lookup(&[]), false).is_err());
        assert!(RuntimeSettings::from_lookup(
            lookup(&[("APPDATA", "/tmp"), (LOG_RETENTION_VAR, "many")]),
            false
        )
        .is_err());
        assert!(RuntimeSettings::from_lookup(
            lookup(&[("APPDATA", "/tmp"), (STREAM_LOGS_VAR, "yes")]),
            false
        )
        .is_err());
    }
}
