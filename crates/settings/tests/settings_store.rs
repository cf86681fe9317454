use batchprint_settings::{Settings, SettingsStore, DEFAULT_PACING_DELAY_MS};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("batchprint.json");

    let store = SettingsStore::load(&path).expect("load defaults");
    let settings = store.settings();
    assert_eq!(settings.backend.path, PathBuf::from("SumatraPDF.exe"));
    assert_eq!(settings.backend.print_settings, "noscale");
    assert_eq!(settings.backend.timeout(), None);
    assert_eq!(settings.dispatch.pacing_delay_ms, DEFAULT_PACING_DELAY_MS);
    assert_eq!(settings.dispatch.document_suffix, ".pdf");
    assert_eq!(settings.printer.default_hints, vec!["L3210", "Epson"]);
    assert!(!path.exists(), "loading defaults must not create the file");
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("batchprint.json");

    let mut settings = Settings::default();
    settings.backend.path = PathBuf::from("/opt/sumatra/SumatraPDF.exe");
    settings.backend.timeout_secs = Some(90);
    settings.dispatch.pacing_delay_ms = 250;
    settings.printer.name = Some("Office Laser".to_string());
    SettingsStore::new(path.clone(), settings)
        .save()
        .expect("save");

    let reloaded = SettingsStore::load(&path).expect("reload");
    let settings = reloaded.settings();
    assert_eq!(
        settings.backend.path,
        PathBuf::from("/opt/sumatra/SumatraPDF.exe")
    );
    assert_eq!(settings.backend.timeout(), Some(Duration::from_secs(90)));
    assert_eq!(settings.dispatch.pacing_delay(), Duration::from_millis(250));
    assert_eq!(settings.printer.name.as_deref(), Some("Office Laser"));
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn partial_file_fills_defaults_and_sanitizes() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("batchprint.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "backend": { "path": "", "print_settings": "  " },
            "dispatch": { "pacing_delay_ms": 999999, "document_suffix": "PDF" }
        }"#,
    )
    .expect("write partial settings");

    let store = SettingsStore::load(&path).expect("load partial file");
    let settings = store.settings();
    assert_eq!(settings.version, 1, "zero version should be upgraded");
    assert_eq!(settings.backend.path, PathBuf::from("SumatraPDF.exe"));
    assert_eq!(settings.backend.print_settings, "noscale");
    assert_eq!(settings.dispatch.pacing_delay_ms, 60_000);
    assert_eq!(settings.dispatch.document_suffix, ".pdf");
    assert_eq!(settings.printer.default_hints, vec!["L3210", "Epson"]);
}

#[test]
fn malformed_file_reports_parse_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("batchprint.json");
    fs::write(&path, "{ not json").expect("write malformed settings");

    let err = SettingsStore::load(&path).unwrap_err();
    assert!(
        err.to_string().contains("failed to parse settings"),
        "unexpected error: {err}"
    );
}

#[test]
fn import_backs_up_existing_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("batchprint.json");
    let incoming = temp.path().join("incoming.json");

    let store = SettingsStore::new(path.clone(), Settings::default());
    store.save().expect("initial save");

    let mut other = Settings::default();
    other.dispatch.pacing_delay_ms = 0;
    other.printer.default_hints = vec!["Brother".to_string()];
    SettingsStore::new(incoming.clone(), other)
        .save()
        .expect("write incoming");

    let mut store = SettingsStore::load(&path).expect("load");
    let backup = store.import_from(&incoming).expect("import");

    assert_eq!(backup, Some(path.with_extension("bak")));
    assert!(path.with_extension("bak").exists());
    let reloaded = SettingsStore::load(&path).expect("reload");
    assert_eq!(reloaded.settings().dispatch.pacing_delay_ms, 0);
    assert_eq!(reloaded.settings().printer.default_hints, vec!["Brother"]);
}

#[test]
fn import_rejects_malformed_source_without_touching_store() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("batchprint.json");
    let incoming = temp.path().join("broken.json");
    fs::write(&incoming, "[1, 2").expect("write broken source");

    let mut settings = Settings::default();
    settings.printer.name = Some("Front Desk".to_string());
    let mut store = SettingsStore::new(path.clone(), settings);
    store.save().expect("initial save");

    assert!(store.import_from(&incoming).is_err());
    assert!(!path.with_extension("bak").exists());
    let reloaded = SettingsStore::load(&path).expect("reload");
    assert_eq!(reloaded.settings().printer.name.as_deref(), Some("Front Desk"));
}

#[test]
fn export_writes_sanitized_copy() {
    let temp = tempdir().expect("tempdir");
    let mut settings = Settings::default();
    settings.dispatch.document_suffix = "PDF".to_string();
    let store = SettingsStore::new(temp.path().join("batchprint.json"), settings);

    let exported = temp.path().join("share").join("printing.json");
    store.export_to(&exported).expect("export");

    let copy = SettingsStore::load(&exported).expect("load export");
    assert_eq!(copy.settings(), store.settings());
    assert_eq!(copy.settings().dispatch.document_suffix, ".pdf");
}
