//! Integration tests for dockenv

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[general]
default_target = "dev"

[targets.dev]
base_image = "base:1"
script_dirs = ["scripts"]

[targets.ci]
base_image = "base:2"
"#;

    const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn dockenv() -> Command {
        let mut cmd = cargo_bin_cmd!("dockenv");
        cmd.env_remove("DOCKENV_CONFIG").env_remove("DOCKENV_LOG");
        cmd
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dockenv.toml"), CONFIG).unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        dir
    }

    fn in_project(dir: &Path) -> Command {
        let mut cmd = dockenv();
        cmd.current_dir(dir);
        cmd
    }

    #[test]
    fn help_displays() {
        dockenv()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached container build environments"));
    }

    #[test]
    fn version_displays() {
        dockenv()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dockenv"));
    }

    #[test]
    fn config_path_is_discovered_from_subdirectory() {
        let dir = project();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        in_project(&nested)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dockenv.toml"));
    }

    #[test]
    fn config_show() {
        let dir = project();
        in_project(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[targets.dev]"));
    }

    #[test]
    fn config_targets_marks_default() {
        let dir = project();
        in_project(dir.path())
            .args(["config", "targets"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dev (base:1)"))
            .stdout(predicate::str::contains("ci (base:2)"));
    }

    #[test]
    fn explicit_missing_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        in_project(dir.path())
            .args(["--config", "nope.toml", "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = project();
        in_project(dir.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached images."));
    }

    #[test]
    fn cache_list_reads_legacy_records() {
        let dir = project();
        fs::write(
            dir.path().join("docker_image_cache.json"),
            format!(r#"{{"{KEY}": ["sha256:feedface", "./10.foo.sh"]}}"#),
        )
        .unwrap();

        in_project(dir.path())
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"image\": \"sha256:feedface\""))
            .stdout(predicate::str::contains(format!("\"digest\": \"{KEY}\"")));
    }

    #[test]
    fn corrupt_cache_is_reported() {
        let dir = project();
        fs::write(dir.path().join("docker_image_cache.json"), "{not json").unwrap();

        in_project(dir.path())
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupt image cache"));
    }

    #[test]
    fn gc_dry_run_lists_orphans_and_keeps_cache() {
        let dir = project();
        let cache = dir.path().join("docker_image_cache.json");
        let content = format!(r#"{{"{KEY}": ["sha256:feedface", "old step"]}}"#);
        fs::write(&cache, &content).unwrap();

        in_project(dir.path())
            .args(["gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sha256:feedface"))
            .stdout(predicate::str::contains("Dry run"));

        assert_eq!(fs::read_to_string(&cache).unwrap(), content);
    }

    #[test]
    fn non_digest_cache_key_is_reported() {
        let dir = project();
        fs::write(
            dir.path().join("docker_image_cache.json"),
            r#"{"aéééééééé": ["sha256:feedface", "old step"]}"#,
        )
        .unwrap();

        in_project(dir.path())
            .args(["gc", "--dry-run"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid digest key"));
    }

    #[test]
    fn gc_dry_run_with_empty_cache() {
        let dir = project();
        in_project(dir.path())
            .args(["gc", "ci", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No unused images for target ci."));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let dir = project();
        in_project(dir.path())
            .args(["run", "prod", "--build-only"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Unknown target: prod"));
    }

    #[test]
    fn init_writes_config_once() {
        let dir = TempDir::new().unwrap();

        in_project(dir.path()).arg("init").assert().success();
        assert!(dir.path().join("dockenv.toml").exists());

        in_project(dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        in_project(dir.path())
            .args(["config", "targets"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dev"));
    }
}
