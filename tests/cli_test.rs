//! CLI integration tests for jsonapi-encode binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("jsonapi-encode"))
}

// Helper to create a temp dataset file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const PEOPLE: &str = r#"{
    "schemas": {
        "people": {
            "attributes": ["firstName", "lastName"],
            "relationships": { "comments": { "showRelated": true } }
        },
        "comments": {
            "relationships": { "author": {} }
        }
    },
    "resources": [
        {
            "type": "people", "id": "9",
            "attributes": { "firstName": "Dan", "lastName": "Gebhardt" },
            "relationships": { "comments": [{ "type": "comments", "id": "5" }] }
        },
        {
            "type": "comments", "id": "5",
            "attributes": { "body": "First!" },
            "relationships": { "author": { "type": "people", "id": "9" } }
        }
    ]
}"#;

fn people_dataset(dir: &TempDir) -> std::path::PathBuf {
    write_temp_file(dir, "people.json", PEOPLE)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

mod encode_command {
    use super::*;

    #[test]
    fn encode_single_with_include() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "9", "--include", "comments"])
            .output()
            .unwrap();

        assert!(output.status.success());
        let document = stdout_json(&output);
        assert_eq!(
            document["data"]["relationships"]["comments"],
            json!({
                "links": { "related": "/people/9/comments" },
                "data": [{ "type": "comments", "id": "5" }]
            })
        );
        assert_eq!(
            document["included"],
            json!([{
                "type": "comments",
                "id": "5",
                "attributes": { "body": "First!" },
                "relationships": { "author": { "data": { "type": "people", "id": "9" } } }
            }])
        );
    }

    #[test]
    fn encode_all_resources_of_type() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap(), "--type", "comments"])
            .output()
            .unwrap();

        assert!(output.status.success());
        let document = stdout_json(&output);
        assert_eq!(document["data"].as_array().unwrap().len(), 1);
        assert!(document.get("included").is_none());
    }

    #[test]
    fn encode_with_fields_and_prefix() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "9"])
            .args(["--fields", "people=firstName,comments"])
            .args(["--url-prefix", "http://example.com"])
            .args(["--jsonapi-version", "1.1"])
            .output()
            .unwrap();

        assert!(output.status.success());
        let document = stdout_json(&output);
        assert_eq!(document["jsonapi"], json!({ "version": "1.1" }));
        assert_eq!(document["data"]["attributes"], json!({ "firstName": "Dan" }));
        assert_eq!(
            document["data"]["relationships"]["comments"]["links"]["related"],
            "http://example.com/people/9/comments"
        );
    }

    #[test]
    fn encode_identifiers() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--identifiers"])
            .output()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(
            stdout_json(&output),
            json!({ "data": [{ "type": "people", "id": "9" }] })
        );
    }

    #[test]
    fn encode_with_pretty() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn encode_with_output_file() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);
        let output = dir.path().join("document.json");

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--output", output.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let document: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(document["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn verbose_logs_to_stderr() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["-vv", "encode", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .success()
            .stderr(predicate::str::contains("loaded dataset"));
    }

    #[test]
    fn rust_log_applies_without_verbose() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .env("RUST_LOG", "debug")
            .args(["check", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .success()
            .stderr(predicate::str::contains("loaded dataset"));
    }

    #[test]
    fn quiet_by_default() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .env_remove("RUST_LOG")
            .args(["check", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .success()
            .stderr(predicate::str::is_empty());
    }
}

const COMPANY: &str = r#"{
    "schemas": {
        "people": {
            "relationships": { "comments": {}, "company": {} },
            "defaultInclude": ["company"]
        },
        "comments": {
            "relationships": { "author": {} },
            "defaultInclude": ["author"]
        },
        "companies": {}
    },
    "resources": [
        {
            "type": "people", "id": "9",
            "relationships": {
                "comments": [{ "type": "comments", "id": "5" }],
                "company": { "type": "companies", "id": "1" }
            }
        },
        {
            "type": "comments", "id": "5",
            "relationships": { "author": { "type": "people", "id": "9" } }
        },
        { "type": "companies", "id": "1", "attributes": { "name": "Acme" } }
    ]
}"#;

fn included_keys(document: &Value) -> Vec<String> {
    document["included"]
        .as_array()
        .map(|included| {
            included
                .iter()
                .map(|r| format!("{}/{}", r["type"].as_str().unwrap(), r["id"].as_str().unwrap()))
                .collect()
        })
        .unwrap_or_default()
}

mod default_includes {
    use super::*;

    #[test]
    fn defaults_expand_without_include() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(&dir, "company.json", COMPANY);

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "comments", "--id", "5"])
            .output()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(included_keys(&stdout_json(&output)), ["people/9", "companies/1"]);
    }

    #[test]
    fn cyclic_defaults_terminate() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(&dir, "company.json", COMPANY);

        // people -> company by default, comments -> author by default
        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "9", "--include", "comments"])
            .output()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(
            included_keys(&stdout_json(&output)),
            ["comments/5", "companies/1"]
        );
    }

    #[test]
    fn include_through_revisited_resource() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(
            &dir,
            "company.json",
            &COMPANY.replace(r#""defaultInclude": ["company"]"#, r#""defaultInclude": []"#),
        );

        let output = cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "9"])
            .args(["--include", "comments.author.company"])
            .output()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(
            included_keys(&stdout_json(&output)),
            ["comments/5", "companies/1"]
        );
    }
}

mod encode_errors {
    use super::*;

    #[test]
    fn unknown_include_path() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--include", "comments.ghost"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("comments.ghost"));
    }

    #[test]
    fn unknown_include_below_revisited_resource() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "9"])
            .args(["--include", "comments.author.ghost"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("comments.author.ghost"));
    }

    #[test]
    fn resource_not_found() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--type", "people", "--id", "404"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn unknown_type() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap(), "--type", "tags"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown type 'tags'"));
    }

    #[test]
    fn id_requires_type() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap(), "--id", "9"])
            .assert()
            .code(2);
    }

    #[test]
    fn malformed_field_set() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .args(["--fields", "firstName"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("TYPE=FIELD"));
    }

    #[test]
    fn file_not_found() {
        cmd()
            .args(["encode", "--dataset", "/nonexistent/people.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_json() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(&dir, "bad.json", "{ not valid json }");

        cmd()
            .args(["encode", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }
}

mod check_command {
    use super::*;

    #[test]
    fn check_valid_dataset() {
        let dir = TempDir::new().unwrap();
        let dataset = people_dataset(&dir);

        cmd()
            .args(["check", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("people: 1 resources"))
            .stdout(predicate::str::contains("2 schemas, 2 resources"));
    }

    #[test]
    fn check_rejects_record_without_schema() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(
            &dir,
            "tags.json",
            r#"{ "schemas": {}, "resources": [{ "type": "tags", "id": "1" }] }"#,
        );

        cmd()
            .args(["check", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no schema"));
    }

    #[test]
    fn check_rejects_undeclared_relationship() {
        let dir = TempDir::new().unwrap();
        let dataset = write_temp_file(
            &dir,
            "tags.json",
            r#"{
                "schemas": { "tags": {} },
                "resources": [{
                    "type": "tags", "id": "1",
                    "relationships": { "owner": { "type": "people", "id": "9" } }
                }]
            }"#,
        );

        cmd()
            .args(["check", "--dataset", dataset.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("undeclared relationship 'owner'"));
    }
}
