use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const SOURCE: &str = "public function f() {\n    if (true) {\n        return 1;\n    }\n}\n";

#[allow(deprecated)]
fn segment() -> Command {
    Command::cargo_bin("segment").expect("binary")
}

#[test]
fn text_output_lists_commands_in_post_order() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("input.php");
    fs::write(&path, SOURCE).unwrap();

    let output = segment().arg(&path).output().expect("command run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let kinds: Vec<_> = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect();
    assert_eq!(kinds, vec!["return", "if", "function"]);
}

#[test]
fn json_output_is_the_whole_segmentation() {
    let output = segment()
        .args(["-", "--format", "json"])
        .write_stdin(SOURCE)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let commands = json["commands"].as_array().expect("commands array");
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[2]["kind"], "function");
    assert_eq!(commands[2]["start"], 0);
    assert_eq!(commands[2]["end_line"], 5);
    assert!(json["diagnostics"].as_array().unwrap().is_empty());
}

#[test]
fn top_level_filters_nested_commands() {
    segment()
        .args(["--top-level"])
        .write_stdin(SOURCE)
        .assert()
        .success()
        .stdout(predicate::str::contains("function"))
        .stdout(predicate::str::contains("return").not());
}

#[test]
fn tree_output_indents_children() {
    segment()
        .args(["--format", "tree"])
        .write_stdin(SOURCE)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("function [1-5]"))
        .stdout(predicate::str::contains("\n    return [3-3] return 1;\n"));
}

#[test]
fn strict_mode_fails_on_unterminated_comment() {
    segment()
        .args(["--strict"])
        .write_stdin("$a = 1; /* never closed")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to segment input"));

    segment()
        .write_stdin("$a = 1; /* never closed")
        .assert()
        .success()
        .stderr(predicate::str::contains("unterminated comment at byte 8"));
}

#[test]
fn strict_mode_fails_on_dangling_marker() {
    segment()
        .args(["--strict"])
        .write_stdin("class A { public }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn custom_rule_table_from_file() {
    let temp = tempdir().unwrap();
    let rules = temp.path().join("rules.toml");
    fs::write(
        &rules,
        r#"
[[rules]]
kind = "variable"
opener = { literal = "let" }
closer = { literal = ";" }
"#,
    )
    .unwrap();

    segment()
        .arg("--rules")
        .arg(&rules)
        .write_stdin("let a = 1; let b = 2;")
        .assert()
        .success()
        .stdout(predicate::str::contains("let a = 1;"))
        .stdout(predicate::str::contains("let b = 2;"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("segment.toml");
    fs::write(&config, "max_depth = 0\n").unwrap();

    segment()
        .arg("--config")
        .arg(&config)
        .write_stdin("$a = 1;")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

#[test]
fn missing_input_file_is_reported() {
    let temp = tempdir().unwrap();
    segment()
        .arg(temp.path().join("missing.php"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
