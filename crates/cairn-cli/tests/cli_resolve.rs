use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[allow(deprecated)]
fn cairn_cmd() -> Command {
    Command::cargo_bin("cairn").unwrap()
}

fn write_recipes(dir: &Path) {
    fs::write(
        dir.join("demo.toml"),
        r#"
[package]
name = "demo"
description = "Demonstration package"

[[version]]
version = "2.1"
sha256 = "aa"

[[version]]
version = "2.0"
sha256 = "bb"

[variant.shared]
default = true
description = "Build shared libraries"

[[dependency]]
package = "zlib@:1.2"

[[conflict]]
compiler = "%gcc@13:"

[[flags.define]]
name = "BUILD_SHARED_LIBS"
variant = "shared"
"#,
    )
    .unwrap();
    fs::write(
        dir.join("zlib.toml"),
        r#"
[package]
name = "zlib"

[[version]]
version = "1.3.1"
sha256 = "cc"

[[version]]
version = "1.2.13"
sha256 = "dd"
"#,
    )
    .unwrap();
}

#[test]
fn test_resolve_prints_tree() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "resolve", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo@2.1"))
        .stdout(predicate::str::contains("zlib@1.2.13"));
}

#[test]
fn test_resolve_shows_flags() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "resolve", "demo", "--flags"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-DBUILD_SHARED_LIBS:BOOL=ON"));
}

#[test]
fn test_resolve_with_override() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "resolve", "demo", "~shared", "--flags"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-DBUILD_SHARED_LIBS:BOOL=OFF"));
}

#[test]
fn test_resolve_json_output() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "resolve", "demo", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"root\": \"demo\""))
        .stdout(predicate::str::contains("\"version\": \"2.1\""))
        .stdout(predicate::str::contains("\"zlib\""));
}

#[test]
fn test_resolve_conflicting_compiler_fails() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "--compiler", "gcc@13.1", "resolve", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflicting constraint"));
}

#[test]
fn test_resolve_why_shows_chain() {
    let tmp = TempDir::new().unwrap();
    write_recipes(tmp.path());

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", ".", "resolve", "demo", "--why", "zlib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Path to zlib"))
        .stdout(predicate::str::contains("demo@2.1"));
}

#[test]
fn test_missing_recipe_directory_fails() {
    let tmp = TempDir::new().unwrap();

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["--recipes", "no-such-dir", "resolve", "demo"])
        .assert()
        .failure();
}

#[test]
fn test_config_file_sets_recipe_dir() {
    let tmp = TempDir::new().unwrap();
    let recipe_dir = tmp.path().join("my-recipes");
    fs::create_dir(&recipe_dir).unwrap();
    write_recipes(&recipe_dir);
    fs::write(tmp.path().join("cairn.toml"), "recipes = \"my-recipes\"\n").unwrap();

    cairn_cmd()
        .current_dir(tmp.path())
        .args(["resolve", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo@2.1"));
}
