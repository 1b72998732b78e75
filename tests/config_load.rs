// tests/config_load.rs
use std::{env, fs};

use activity_digest::config::{ENV_CONFIG_PATH, ENV_GITHUB_TOKEN, ENV_OPENAI_API_KEY};
use activity_digest::DigestConfig;
use serial_test::serial;

const MINIMAL: &str = r#"
[github]
owner = "acme"
repo = "widget"

[bluesky]
handle = "acme.bsky.social"
"#;

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_GITHUB_TOKEN);
    env::remove_var(ENV_OPENAI_API_KEY);
}

fn write_config(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digest.toml");
    fs::write(&path, body).unwrap();
    (dir, path)
}

#[test]
#[serial]
fn secrets_come_from_env_when_sentinel() {
    clear_env();
    env::set_var(ENV_GITHUB_TOKEN, "ghp_from_env");
    env::set_var(ENV_OPENAI_API_KEY, "sk-from-env");
    let (_dir, path) = write_config(MINIMAL);

    let cfg = DigestConfig::load_from_file(&path).unwrap();
    assert_eq!(cfg.github.token, "ghp_from_env");
    assert_eq!(cfg.llm.api_key, "sk-from-env");
    clear_env();
}

#[test]
#[serial]
fn missing_github_token_fails_before_any_run() {
    clear_env();
    env::set_var(ENV_OPENAI_API_KEY, "sk-from-env");
    let (_dir, path) = write_config(MINIMAL);

    let err = DigestConfig::load_from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains(ENV_GITHUB_TOKEN));
    clear_env();
}

#[test]
#[serial]
fn missing_llm_key_fails_too() {
    clear_env();
    env::set_var(ENV_GITHUB_TOKEN, "ghp_from_env");
    let (_dir, path) = write_config(MINIMAL);

    let err = DigestConfig::load_from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains(ENV_OPENAI_API_KEY));
    clear_env();
}

#[test]
#[serial]
fn config_path_env_is_honored() {
    clear_env();
    let (_dir, path) = write_config(&format!(
        "{MINIMAL}\n[output]\ndir = \"out/posts\"\n\n[llm]\napi_key = \"sk-inline\"\n"
    ));
    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var(ENV_GITHUB_TOKEN, "ghp_from_env");

    let cfg = DigestConfig::load_default().unwrap();
    assert_eq!(cfg.output.dir, std::path::PathBuf::from("out/posts"));
    assert_eq!(cfg.llm.api_key, "sk-inline");
    clear_env();
}

#[test]
#[serial]
fn config_path_env_pointing_nowhere_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/a/config.toml");
    assert!(DigestConfig::load_default().is_err());
    clear_env();
}

#[test]
#[serial]
fn bluesky_handle_required_only_when_enabled() {
    clear_env();
    env::set_var(ENV_GITHUB_TOKEN, "ghp_from_env");
    env::set_var(ENV_OPENAI_API_KEY, "sk-from-env");

    let (_dir, path) = write_config("[github]\nowner = \"acme\"\nrepo = \"widget\"\n");
    assert!(DigestConfig::load_from_file(&path).is_err());

    let (_dir2, path2) = write_config(
        "[github]\nowner = \"acme\"\nrepo = \"widget\"\n\n[bluesky]\nenabled = false\n",
    );
    let cfg = DigestConfig::load_from_file(&path2).unwrap();
    assert!(!cfg.bluesky.enabled);
    clear_env();
}
