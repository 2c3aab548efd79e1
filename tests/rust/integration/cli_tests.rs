//! Tests for the `relgraph` binary against definitions files on disk.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const DEFINITIONS: &str = r#"
entities:
  - name: groups
    properties:
      - name: id
        type: integer
      - name: title
        type: string
    id: id
  - name: persons
    properties:
      - name: id
        type: integer
      - name: name
        type: string
    id: id
  - name: memberships
    properties:
      - name: group_id
        type: integer
      - name: person_id
        type: integer

relations:
  - name: group_members
    target: groups
    via:
      - entity: memberships
        referencing: group_id
        referenced: person_id
    source: persons
    sort:
      - property: name
"#;

fn definitions_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn relgraph(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_relgraph"))
        .args(args)
        .env_remove("RELGRAPH_TARGET_ALIAS")
        .env_remove("RELGRAPH_SOURCE_ALIAS")
        .env_remove("RELGRAPH_ID_SEPARATOR")
        .env_remove("RELGRAPH_SELECTOR_LIMIT")
        .env_remove("RELGRAPH_DIALECT")
        .env("RUST_LOG", "error")
        .output()
        .unwrap()
}

#[test]
fn test_compile_prints_sql_and_params() {
    let file = definitions_file(DEFINITIONS);
    let output = relgraph(&[
        "compile",
        "--definitions",
        file.path().to_str().unwrap(),
        "--relation",
        "group_members",
        "--target-id",
        "7",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "SELECT \"source\".*\n\
         FROM \"groups\" AS \"target\"\n\
         INNER JOIN \"memberships\" AS \"memberships\" ON \"target\".\"id\" = \"memberships\".\"group_id\"\n\
         INNER JOIN \"persons\" AS \"source\" ON \"memberships\".\"person_id\" = \"source\".\"id\"\n\
         WHERE \"target\".\"id\" = ?\n\
         ORDER BY \"source\".\"name\" ASC\n\
         -- params: [7]\n"
    );
}

#[test]
fn test_compile_with_mysql_dialect() {
    let file = definitions_file(DEFINITIONS);
    let output = relgraph(&[
        "compile",
        "--dialect",
        "mysql",
        "--definitions",
        file.path().to_str().unwrap(),
        "--relation",
        "group_members",
        "--selector",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("SELECT `source`.`id` AS `id`\nFROM `groups` AS `target`\n"));
    assert!(stdout.ends_with("-- params: []\n"));
}

#[test]
fn test_check_reports_every_relation() {
    let file = definitions_file(DEFINITIONS);
    let output = relgraph(&["check", "--definitions", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("ok  group_members (persons -> groups, 1 waypoints)"));
    assert!(stdout.ends_with("1 relations checked\n"));
}

#[test]
fn test_check_fails_on_broken_relation() {
    let broken = DEFINITIONS.replace("referenced: person_id", "referenced: member_id");
    let file = definitions_file(&broken);
    let output = relgraph(&["check", "--definitions", file.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("member_id"));
}

#[test]
fn test_unknown_relation_fails() {
    let file = definitions_file(DEFINITIONS);
    let output = relgraph(&[
        "compile",
        "--definitions",
        file.path().to_str().unwrap(),
        "--relation",
        "owners",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("No relation named `owners`"));
}

#[test]
fn test_schema_prints_create_statements() {
    let file = definitions_file(DEFINITIONS);
    let output = relgraph(&["schema", "--definitions", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("CREATE TABLE IF NOT EXISTS \"memberships\" ("));
    assert!(stdout.contains("PRIMARY KEY (\"group_id\", \"person_id\")"));
    assert_eq!(stdout.matches("CREATE TABLE").count(), 3);
}
