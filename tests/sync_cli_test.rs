use assert_cmd::Command;
use fs2::FileExt;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn archive_cmd(home: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("zulip-archive");
    cmd.current_dir(home)
        .env("ZULIP_ARCHIVE_HOME", home)
        .env_remove("ZULIP_ARCHIVE_JSON_DIR")
        .env_remove("ZULIP_ARCHIVE_SITE")
        .env_remove("ZULIP_ARCHIVE_EMAIL")
        .env_remove("ZULIP_ARCHIVE_API_KEY")
        .env_remove("ZULIP_ARCHIVE_CONFIG_PATH");
    cmd
}

#[test]
fn incremental_without_prior_index_fails_before_any_network_use() {
    let tmp = tempdir().expect("tempdir");
    fs::create_dir_all(tmp.path().join("json")).expect("mkdir json");

    archive_cmd(tmp.path())
        .args(["sync", "--incremental"])
        .assert()
        .failure()
        .stderr(contains("no prior stream index"))
        .stderr(contains("sync --full"));

    assert!(!tmp.path().join("json/stream_index.json").exists());
}

#[test]
fn full_and_incremental_together_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    fs::create_dir_all(tmp.path().join("json")).expect("mkdir json");

    archive_cmd(tmp.path())
        .args(["sync", "-t", "-i"])
        .assert()
        .failure()
        .stderr(contains("both a full and an incremental"));
}

#[test]
fn sync_without_a_mode_is_rejected() {
    let tmp = tempdir().expect("tempdir");

    archive_cmd(tmp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("no sync mode requested"));
}

#[test]
fn missing_archive_directory_suggests_mkdir() {
    let tmp = tempdir().expect("tempdir");
    let json_dir = tmp.path().join("not-there");

    archive_cmd(tmp.path())
        .env("ZULIP_ARCHIVE_JSON_DIR", &json_dir)
        .args(["sync", "--full"])
        .assert()
        .failure()
        .stderr(contains("mkdir -p"));

    assert!(!json_dir.exists());
}

#[test]
fn full_sync_without_credentials_names_the_missing_setting() {
    let tmp = tempdir().expect("tempdir");
    let json_dir = tmp.path().join("json");
    fs::create_dir_all(&json_dir).expect("mkdir json");

    archive_cmd(tmp.path())
        .args(["sync", "--full"])
        .assert()
        .failure()
        .stderr(contains("zulip.site"));

    let lock = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(json_dir.join(".sync.lock"))
        .expect("lock file is left in place");
    lock.try_lock_exclusive().expect("lock released on exit");
    assert!(!json_dir.join("stream_index.json").exists());
}

#[test]
fn invalid_config_file_is_reported() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        tmp.path().join("archive.toml"),
        "[fetch]\npage_size = 0\n",
    )
    .expect("write config");

    archive_cmd(tmp.path())
        .args(["sync", "--full"])
        .assert()
        .failure()
        .stderr(contains("page_size"));
}
