use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const SETTINGS_VERSION: u32 = 1;

pub const DEFAULT_BACKEND_PATH: &str = "SumatraPDF.exe";
pub const DEFAULT_PRINT_SETTINGS: &str = "noscale";
pub const DEFAULT_PACING_DELAY_MS: u64 = 1500;
pub const MAX_PACING_DELAY_MS: u64 = 60_000;
const DEFAULT_DOCUMENT_SUFFIX: &str = ".pdf";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub printer: PrinterSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            backend: BackendSettings::default(),
            dispatch: DispatchSettings::default(),
            printer: PrinterSettings::default(),
        }
    }
}

impl Settings {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = SETTINGS_VERSION;
        }
        self.backend.sanitize();
        self.dispatch.sanitize();
        self.printer.sanitize();
    }
}

/// External rendering backend used to hand documents to the spooler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_path")]
    pub path: PathBuf,
    /// Value passed to `-print-settings`. `noscale` keeps line weight intact.
    #[serde(default = "default_print_settings")]
    pub print_settings: String,
    /// Upper bound for a single backend invocation. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_backend_path() -> PathBuf {
    PathBuf::from(DEFAULT_BACKEND_PATH)
}

fn default_print_settings() -> String {
    DEFAULT_PRINT_SETTINGS.to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            path: default_backend_path(),
            print_settings: default_print_settings(),
            timeout_secs: None,
        }
    }
}

impl BackendSettings {
    fn sanitize(&mut self) {
        if self.path.as_os_str().is_empty() {
            self.path = default_backend_path();
        }
        if self.print_settings.trim().is_empty() {
            self.print_settings = default_print_settings();
        } else {
            self.print_settings = self.print_settings.trim().to_string();
        }
        if self.timeout_secs == Some(0) {
            self.timeout_secs = None;
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,
    #[serde(default = "default_document_suffix")]
    pub document_suffix: String,
    /// Where transient job files are written. Falls back to the OS temp dir.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_pacing_delay() -> u64 {
    DEFAULT_PACING_DELAY_MS
}

fn default_document_suffix() -> String {
    DEFAULT_DOCUMENT_SUFFIX.to_string()
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pacing_delay_ms: default_pacing_delay(),
            document_suffix: default_document_suffix(),
            scratch_dir: None,
        }
    }
}

impl DispatchSettings {
    fn sanitize(&mut self) {
        self.pacing_delay_ms = self.pacing_delay_ms.min(MAX_PACING_DELAY_MS);
        let suffix = self.document_suffix.trim().trim_start_matches('.');
        self.document_suffix = if suffix.is_empty() {
            default_document_suffix()
        } else {
            format!(".{}", suffix.to_ascii_lowercase())
        };
        if matches!(&self.scratch_dir, Some(dir) if dir.as_os_str().is_empty()) {
            self.scratch_dir = None;
        }
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSettings {
    /// Explicit target; when unset the first printer matching a hint is used.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_hints")]
    pub default_hints: Vec<String>,
}

fn default_hints() -> Vec<String> {
    vec!["L3210".to_string(), "Epson".to_string()]
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            name: None,
            default_hints: default_hints(),
        }
    }
}

impl PrinterSettings {
    fn sanitize(&mut self) {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            self.name = None;
        }
        self.default_hints.retain(|hint| !hint.trim().is_empty());
    }
}

/// The settings file behind one `--config` path.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, mut settings: Settings) -> Self {
        settings.sanitize();
        Self {
            path: path.into(),
            data: settings,
        }
    }

    /// Reads `path`, or falls back to defaults when it does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "settings file missing, using defaults");
            return Ok(Self::new(path, Settings::default()));
        }
        let data = read_settings(path)?;
        debug!(path = %path.display(), "settings loaded");
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a sibling `.tmp` file and renames it over the settings file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let staging = self.path.with_extension("tmp");
        write_settings(&staging, &self.data)?;
        fs::rename(&staging, &self.path).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Copies the effective (sanitized) settings to another file.
    pub fn export_to(&self, destination: impl AsRef<Path>) -> Result<(), SettingsError> {
        write_settings(destination.as_ref(), &self.data)
    }

    /// Replaces the stored settings with the contents of `source`.
    ///
    /// The incoming file is validated before anything is touched. An existing
    /// settings file is kept as `<name>.bak`, whose path is returned.
    pub fn import_from(
        &mut self,
        source: impl AsRef<Path>,
    ) -> Result<Option<PathBuf>, SettingsError> {
        let incoming = read_settings(source.as_ref())?;
        let backup = if self.path.exists() {
            let backup = self.path.with_extension("bak");
            fs::copy(&self.path, &backup).map_err(|source| SettingsError::Write {
                path: backup.clone(),
                source,
            })?;
            Some(backup)
        } else {
            None
        };
        self.data = incoming;
        self.save()?;
        Ok(backup)
    }
}

fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: Settings =
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    settings.sanitize();
    Ok(settings)
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let payload =
        serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, payload).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_normalised() {
        let mut dispatch = DispatchSettings {
            document_suffix: " PDF ".into(),
            ..DispatchSettings::default()
        };
        dispatch.sanitize();
        assert_eq!(dispatch.document_suffix, ".pdf");

        dispatch.document_suffix = ".".into();
        dispatch.sanitize();
        assert_eq!(dispatch.document_suffix, ".pdf");

        dispatch.document_suffix = ".xps".into();
        dispatch.sanitize();
        assert_eq!(dispatch.document_suffix, ".xps");
    }

    #[test]
    fn pacing_delay_is_clamped() {
        let mut dispatch = DispatchSettings {
            pacing_delay_ms: 10 * MAX_PACING_DELAY_MS,
            ..DispatchSettings::default()
        };
        dispatch.sanitize();
        assert_eq!(dispatch.pacing_delay(), Duration::from_millis(MAX_PACING_DELAY_MS));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let mut backend = BackendSettings {
            timeout_secs: Some(0),
            ..BackendSettings::default()
        };
        backend.sanitize();
        assert_eq!(backend.timeout(), None);

        backend.timeout_secs = Some(30);
        backend.sanitize();
        assert_eq!(backend.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn blank_printer_values_are_dropped() {
        let mut printer = PrinterSettings {
            name: Some("  ".into()),
            default_hints: vec!["".into(), "HP".into(), " ".into()],
        };
        printer.sanitize();
        assert_eq!(printer.name, None);
        assert_eq!(printer.default_hints, vec!["HP".to_string()]);
    }
}
