use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn regen_merge(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("regen-merge").unwrap();
    cmd.arg("--path").arg(root);
    cmd
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn read(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join(name)).unwrap()
}

#[test]
fn test_update_creates_missing_target() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "gen/api.js", "export function f(){}");

    regen_merge(dir.path())
        .args(["update", "src/api.js", "gen/api.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));

    assert_eq!(read(dir.path(), "src/api.js"), "export function f(){}");
}

#[test]
fn test_update_skips_unchanged_target() {
    let dir = TempDir::new().unwrap();
    let source = "import http from './http';\nexport const getUser = (id) => http.get(`/users/${id}`);\n";
    write(dir.path(), "api.js", source);
    write(dir.path(), "gen.js", source);

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skip"));

    assert_eq!(read(dir.path(), "api.js"), source);
}

#[test]
fn test_update_rename_keeps_both_versions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "api.js", "export function f(a) { return a; }\n");
    write(dir.path(), "gen.js", "export function f(a, b) { return a + b; }\n");

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js", "--policy", "rename"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[rename]"))
        .stdout(predicate::str::contains("f_v2"));

    let merged = read(dir.path(), "api.js");
    assert!(merged.contains("export function f(a) { return a; }"));
    assert!(merged.contains("export function f_v2(a, b) { return a + b; }"));
}

#[test]
fn test_update_overwrite_json() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "api.js", "export function f(a) { return a; }\n");
    write(dir.path(), "gen.js", "export function f(a, b) { return a + b; }\n");

    let output = regen_merge(dir.path())
        .args(["update", "api.js", "gen.js", "--policy", "overwrite", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["action"], "update");
    assert_eq!(result["success"], true);

    let merged = read(dir.path(), "api.js");
    assert_eq!(merged, "export function f(a, b) { return a + b; }\n");
}

#[test]
fn test_update_retains_deleted_functions() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "api.js",
        "export function f() {}\nexport function custom() { return 'mine'; }\n",
    );
    write(dir.path(), "gen.js", "export function f() {}\n");

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js"])
        .assert()
        .success();
    assert!(read(dir.path(), "api.js").contains("custom()"));

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js", "--remove-deleted"])
        .assert()
        .success();
    assert_eq!(read(dir.path(), "api.js"), "export function f() {}\n");
}

#[test]
fn test_dry_run_does_not_write() {
    let dir = TempDir::new().unwrap();
    let existing = "export function f() {}\n";
    write(dir.path(), "api.js", existing);
    write(dir.path(), "gen.js", "export function f() {}\nexport function g() {}\n");

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry run]"))
        .stdout(predicate::str::contains("+export function g() {}"));

    assert_eq!(read(dir.path(), "api.js"), existing);
}

#[test]
fn test_update_fails_on_malformed_target() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "api.js", "export function (");
    write(dir.path(), "gen.js", "export function f() {}\n");

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Update of"));

    assert_eq!(read(dir.path(), "api.js"), "export function (");
}

#[test]
fn test_config_policy_is_used() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        ".regen-merge/config.toml",
        "[merge]\nconflict_resolution = \"skip\"\n",
    );
    write(dir.path(), "api.js", "export function f(a) {}\n");
    write(dir.path(), "gen.js", "export function f(a, b) {}\n");

    regen_merge(dir.path())
        .args(["update", "api.js", "gen.js"])
        .assert()
        .success();
    assert_eq!(read(dir.path(), "api.js"), "export function f(a) {}\n");

    regen_merge(dir.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Conflict resolution: skip"));
}

#[test]
fn test_compare_reports_changes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "old.ts", "export function load(id: number) {}\nexport interface User { id: number }\n");
    write(dir.path(), "new.ts", "export function load(id: number, force: boolean) {}\n");

    regen_merge(dir.path())
        .args(["compare", "old.ts", "new.ts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("~ function load"))
        .stdout(predicate::str::contains("- class User"))
        .stdout(predicate::str::contains("Parameter count changed from 1 to 2"));
}

#[test]
fn test_analyze_directory() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/user.js",
        "import http from './http';\nexport async function getUser(id) {}\nexport class Api {}\n",
    );
    write(dir.path(), "src/notes.md", "# not source\n");

    regen_merge(dir.path())
        .args(["analyze", "src", "--entities"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user.js"))
        .stdout(predicate::str::contains("1 imports, 2 exports, 1 functions, 1 classes"))
        .stdout(predicate::str::contains("getUser"))
        .stdout(predicate::str::contains("notes.md").not());
}
