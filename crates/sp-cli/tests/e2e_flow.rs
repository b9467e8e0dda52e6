//! End-to-end tests for the `sp` binary.
//!
//! Each test runs against its own temporary home directory, database, and
//! model file.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn sp_binary() -> String {
    env!("CARGO_BIN_EXE_sp").to_string()
}

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn model_path(&self) -> PathBuf {
        self.path().join("data/model.json")
    }

    fn write_subjects(&self, json: &str) -> PathBuf {
        let path = self.path().join("subjects.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(sp_binary())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("SP_DATABASE_PATH", self.path().join("data/sp.db"))
            .env("SP_MODEL_PATH", self.model_path())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("failed to run sp")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "sp {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

const SUBJECTS: &str = r#"[
    {"name": "Math", "deadline": "2025-01-10", "syllabus_size": 12, "difficulty": 4, "importance": 5, "task_type": "Exam"},
    {"name": "History", "deadline": "2025-01-06", "syllabus_size": 4, "difficulty": 2, "importance": 3}
]"#;

fn parse(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap()
}

#[test]
fn test_generate_is_reproducible_for_a_variant() {
    let env = Env::new();
    let subjects = env.write_subjects(SUBJECTS);
    let subjects = subjects.to_str().unwrap();
    let args = [
        "generate",
        "--subjects",
        subjects,
        "--today",
        "2025-01-01",
        "--variant",
        "7",
        "--no-record",
        "--json",
    ];

    let first = parse(&env.run_ok(&args));
    let second = parse(&env.run_ok(&args));

    assert_eq!(first, second);
    assert_eq!(first["variant"], 7);
    assert_eq!(first["model_trained"], false);

    // Horizon runs through the latest deadline.
    let days: Vec<&String> = first["timetable"].as_object().unwrap().keys().collect();
    assert_eq!(days.first().map(|d| d.as_str()), Some("2025-01-01"));
    assert_eq!(days.last().map(|d| d.as_str()), Some("2025-01-10"));
    assert_eq!(days.len(), 10);

    for slots in first["timetable"].as_object().unwrap().values() {
        let total: f64 = slots
            .as_array()
            .unwrap()
            .iter()
            .map(|slot| slot["hours"].as_f64().unwrap())
            .sum();
        assert!(total <= 5.0 + 0.05, "day total {total} exceeds budget");
    }
    assert!(!env.model_path().exists());
}

#[test]
fn test_missing_deadline_is_rejected() {
    let env = Env::new();
    let subjects = env.write_subjects(r#"[{"name": "Math", "syllabus_size": 3}]"#);

    let output = env.run(&["generate", "--subjects", subjects.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("deadline missing"), "stderr: {stderr}");
}

#[test]
fn test_unavailable_day_is_empty() {
    let env = Env::new();
    let subjects = env.write_subjects(SUBJECTS);

    let stdout = env.run_ok(&[
        "generate",
        "--subjects",
        subjects.to_str().unwrap(),
        "--today",
        "2025-01-01",
        "--variant",
        "3",
        "--unavailable",
        "2025-01-02",
        "--no-record",
        "--json",
    ]);

    let value = parse(&stdout);
    assert_eq!(value["timetable"]["2025-01-02"], serde_json::json!([]));
    assert!(
        !value["timetable"]["2025-01-01"]
            .as_array()
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_generate_records_history_and_trains() {
    let env = Env::new();
    let subjects = env.write_subjects(SUBJECTS);

    let stdout = env.run_ok(&[
        "generate",
        "--subjects",
        subjects.to_str().unwrap(),
        "--today",
        "2025-01-01",
        "--variant",
        "11",
        "--json",
    ]);

    assert_eq!(parse(&stdout)["model_trained"], true);
    assert!(env.model_path().exists());

    let stdout = env.run_ok(&[
        "record-session",
        "--subject",
        "Math",
        "--hours",
        "2.5",
        "--days-to-deadline",
        "4",
    ]);
    assert_eq!(stdout.trim(), "Recorded 2.50h of Math");

    let stdout = env.run_ok(&["train"]);
    assert!(stdout.starts_with("Trained effort model on "), "stdout: {stdout}");

    // Planning with the trained model covers the same horizon.
    let value = parse(&env.run_ok(&[
        "reschedule",
        "--subjects",
        subjects.to_str().unwrap(),
        "--today",
        "2025-01-01",
        "--no-record",
        "--json",
    ]));
    assert!(value["variant"].is_i64());
    assert_eq!(value["timetable"].as_object().unwrap().len(), 10);
}

#[test]
fn test_train_without_history_fails() {
    let env = Env::new();

    let output = env.run(&["train"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no session history"), "stderr: {stderr}");
}

#[test]
fn test_saved_plans_roundtrip() {
    let env = Env::new();
    let subjects = env.write_subjects(SUBJECTS);

    let saved = parse(&env.run_ok(&[
        "generate",
        "--subjects",
        subjects.to_str().unwrap(),
        "--today",
        "2025-01-01",
        "--variant",
        "5",
        "--no-record",
        "--save",
        "Finals",
        "--json",
    ]));
    let id = saved["saved_id"].as_i64().unwrap();

    let list = parse(&env.run_ok(&["plans", "list", "--json"]));
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["title"], "Finals");
    assert_eq!(list[0]["variant"], "5");

    let shown = parse(&env.run_ok(&["plans", "show", &id.to_string(), "--json"]));
    assert_eq!(shown["timetable"], saved["timetable"]);

    let stdout = env.run_ok(&["plans", "delete", &id.to_string()]);
    assert_eq!(stdout.trim(), format!("Deleted plan {id}"));

    let output = env.run(&["plans", "show", &id.to_string()]);
    assert!(!output.status.success());
}

#[test]
fn test_no_subcommand_prints_help() {
    let env = Env::new();

    let stdout = env.run_ok(&[]);

    assert!(stdout.contains("generate"));
    assert!(stdout.contains("record-session"));
}
