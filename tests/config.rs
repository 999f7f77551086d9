//! Configuration loading and live reload tests

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use jarvis_voice::events::Sender;
use jarvis_voice::input::Routed;
use jarvis_voice::watcher::{ConfigWatcher, ReloadOutcome};
use jarvis_voice::{ConfigStore, Error};

mod common;

use common::{Harness, HarnessBuilder, test_settings};

/// Write `content` and push the modification time forward
fn write_config(path: &Path, content: &str, age: u64) {
    std::fs::write(path, content).unwrap();
    let mtime = SystemTime::now() + Duration::from_secs(age);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

fn watched(path: &Path) -> Harness {
    HarnessBuilder::new(test_settings()).config_path(path).build()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(dir.path().join("config.json")).unwrap();

    let settings = store.snapshot();
    assert!(settings.voice_input_enabled);
    assert_eq!(settings.wake_words[0], "jarvis");
    assert_eq!(settings.sample_rate, 16000);
}

#[test]
fn test_json_and_toml_documents() {
    let dir = tempfile::tempdir().unwrap();

    let json = dir.path().join("config.json");
    std::fs::write(
        &json,
        r#"{"wake_words": ["computadora"], "command_window": 4.5, "tts": {"provider": "none"}}"#,
    )
    .unwrap();
    let settings = ConfigStore::open(&json).unwrap().snapshot();
    assert_eq!(settings.wake_words, vec!["computadora".to_string()]);
    assert_eq!(settings.command_window(), Duration::from_secs_f32(4.5));
    assert_eq!(settings.tts.provider, "none");
    // untouched fields keep their defaults
    assert_eq!(settings.min_command_chars, 3);

    let toml = dir.path().join("config.toml");
    std::fs::write(
        &toml,
        "voice_input_enabled = false\n\n[integrations.launcher.apps]\nterminal = \"xterm\"\n",
    )
    .unwrap();
    let settings = ConfigStore::open(&toml).unwrap().snapshot();
    assert!(!settings.voice_input_enabled);
    assert_eq!(
        settings.integrations.launcher.apps.get("terminal").map(String::as_str),
        Some("xterm")
    );
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"volume_threshold": 2.0}"#).unwrap();

    assert!(matches!(ConfigStore::open(&path), Err(Error::Config(_))));
}

#[test]
fn test_failed_reload_keeps_previous_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"wake_words": ["viernes"]}"#).unwrap();
    let store = ConfigStore::open(&path).unwrap();

    std::fs::write(&path, r#"{"wake_words": ["#).unwrap();
    assert!(matches!(store.reload(), Err(Error::ConfigReload(_))));
    assert_eq!(store.snapshot().wake_words, vec!["viernes".to_string()]);

    std::fs::write(&path, r#"{"wake_words": ["sábado"]}"#).unwrap();
    let reloaded = store.reload().unwrap();
    assert_eq!(reloaded.wake_words, vec!["sábado".to_string()]);
    assert_eq!(store.snapshot().wake_words, vec!["sábado".to_string()]);
}

#[test]
fn test_reload_rejects_durations_that_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"command_window": 4}"#).unwrap();
    let store = ConfigStore::open(&path).unwrap();

    std::fs::write(&path, r#"{"command_window": 1e20}"#).unwrap();
    let err = store.reload().unwrap_err();
    assert!(matches!(err, Error::ConfigReload(_)));
    assert!(err.to_string().contains("command_window"));
    assert_eq!(store.snapshot().command_window(), Duration::from_secs(4));
}

#[test]
fn test_watcher_detects_modification_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, "{}", 0);

    let h = watched(&path);
    let mut watcher = ConfigWatcher::new(h.assistant.clone());
    assert!(!watcher.poll_change());

    write_config(&path, r#"{"min_command_chars": 5}"#, 60);
    assert!(watcher.poll_change());
    assert!(!watcher.poll_change());
}

#[test]
fn test_watcher_ignores_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let h = watched(&path);
    let mut watcher = ConfigWatcher::new(h.assistant.clone());

    assert!(!watcher.poll_change());
}

#[tokio::test]
async fn test_confirmed_reload_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, r#"{"voice_input_enabled": false, "min_command_chars": 7}"#, 0);

    let h = watched(&path);
    let watcher = ConfigWatcher::new(h.assistant.clone());
    let task = tokio::spawn(async move { watcher.confirm_and_apply().await });
    settle().await;

    // the microphone is held off while the question is pending
    assert!(!h.assistant.listening().is_listening());
    assert_eq!(h.assistant.input().route("Sí, claro".to_string()), Routed::Claimed);

    assert_eq!(task.await.unwrap(), ReloadOutcome::Applied);
    assert_eq!(h.assistant.config().snapshot().min_command_chars, 7);
    assert!(h.assistant.listening().is_listening());
    assert!(
        h.sink
            .messages_from(Sender::System)
            .contains(&"Configuración aplicada.".to_string())
    );
}

#[tokio::test]
async fn test_declined_reload_keeps_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, r#"{"voice_input_enabled": false, "min_command_chars": 7}"#, 0);

    let h = watched(&path);
    let watcher = ConfigWatcher::new(h.assistant.clone());
    let task = tokio::spawn(async move { watcher.confirm_and_apply().await });
    settle().await;

    assert_eq!(h.assistant.input().route("no".to_string()), Routed::Claimed);
    assert_eq!(task.await.unwrap(), ReloadOutcome::Declined);
    assert_eq!(h.assistant.config().snapshot().min_command_chars, 3);
    assert!(h.assistant.listening().is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_reload_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, r#"{"min_command_chars": 7}"#, 0);

    let h = watched(&path);
    let watcher = ConfigWatcher::new(h.assistant.clone());

    assert_eq!(watcher.confirm_and_apply().await, ReloadOutcome::TimedOut);
    assert_eq!(h.assistant.config().snapshot().min_command_chars, 3);
    assert!(
        h.sink
            .messages_from(Sender::System)
            .contains(&"Sin respuesta. Configuración NO recargada.".to_string())
    );
}

#[tokio::test]
async fn test_invalid_file_fails_reload_but_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, "{ not json", 0);

    let h = watched(&path);
    let watcher = ConfigWatcher::new(h.assistant.clone());
    let task = tokio::spawn(async move { watcher.confirm_and_apply().await });
    settle().await;

    assert_eq!(h.assistant.input().route("sí".to_string()), Routed::Claimed);
    assert!(matches!(task.await.unwrap(), ReloadOutcome::Failed(_)));
    assert_eq!(h.assistant.config().snapshot().min_command_chars, 3);
    assert_eq!(h.sink.messages_from(Sender::Error).len(), 1);

    // commands still resolve with the previous settings
    h.assistant.submit_text("qué hora es".to_string()).await;
    assert_eq!(h.backend.prompts(), vec!["qué hora es".to_string()]);
}
