use easel_core::FileStore;
use easel_core::KeyValueStore;
use easel_core::store::API_KEY_STORAGE_KEY;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::VALID_KEY;
use super::easel_cmd;

fn stored_key(home: &TempDir) -> Option<String> {
    FileStore::open(home.path())
        .unwrap()
        .get(API_KEY_STORAGE_KEY)
        .unwrap()
}

#[test]
fn short_key_is_refused() {
    let home = TempDir::new().unwrap();

    easel_cmd(home.path())
        .args(["login", "--api-key", "sk-short"])
        .assert()
        .failure()
        .stderr(contains("Please enter a valid API key"));
    assert_eq!(stored_key(&home), None);
}

#[test]
fn login_from_stdin_then_logout() {
    let home = TempDir::new().unwrap();

    easel_cmd(home.path())
        .arg("login")
        .write_stdin(format!("  {VALID_KEY}\n"))
        .assert()
        .success()
        .stderr(contains("API key saved"));
    assert_eq!(stored_key(&home).as_deref(), Some(VALID_KEY));

    easel_cmd(home.path()).arg("logout").assert().success();
    assert_eq!(stored_key(&home), None);
}
