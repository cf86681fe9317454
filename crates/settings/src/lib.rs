//! Persistent configuration for the batch print dispatcher.

pub mod settings;

pub use settings::{
    BackendSettings, DispatchSettings, PrinterSettings, Settings, SettingsError, SettingsStore,
    DEFAULT_BACKEND_PATH, DEFAULT_PACING_DELAY_MS, DEFAULT_PRINT_SETTINGS, MAX_PACING_DELAY_MS,
};
