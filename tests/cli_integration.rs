use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Sandbox {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, content).expect("write test file");
        path
    }

    /// Run the binary with HOME pointed into the sandbox so no user config leaks in
    fn run(&self, args: &[&str]) -> (bool, Vec<u8>, Vec<u8>) {
        let bin = std::env::var("CARGO_BIN_EXE_chatstats").unwrap_or_else(|_| {
            let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push("target");
            path.push("debug");
            if cfg!(windows) {
                path.push("chatstats.exe");
            } else {
                path.push("chatstats");
            }
            path.to_string_lossy().into_owned()
        });
        let home = self.dir.path();
        let output = Command::new(bin)
            .args(args)
            .env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join(".config"))
            .env_remove("RUST_LOG")
            .output()
            .expect("run chatstats");
        (output.status.success(), output.stdout, output.stderr)
    }
}

fn message(role: &str, text: &str, slug: Option<&str>) -> Value {
    let mut msg = json!({
        "author": {"role": role},
        "content": {"content_type": "text", "parts": [text]},
    });
    if let Some(slug) = slug {
        msg["end_turn"] = json!(true);
        msg["metadata"] = json!({"model_slug": slug});
    }
    json!({ "message": msg })
}

/// Two turns on 2024-03-10 14:30 UTC; heuristic counts are 1, 2, 1, 1 tokens
fn export() -> String {
    json!([
        {
            "id": "conv-1",
            "title": "Sorting",
            "create_time": 1_710_081_000.25,
            "mapping": {
                "root": {"message": null},
                "n1": message("user", "abcd", None),
                "n2": message("assistant", "abcdefgh", Some("gpt-4o")),
                "n3": message("user", "abcd", None),
                "n4": message("assistant", "abcd", Some("gpt-4o"))
            }
        },
        "garbage entry",
        {
            "id": "conv-2",
            "mapping": {
                "n1": message("user", "hi", None),
                "n2": message("assistant", "yo", Some("foo-bar"))
            }
        }
    ])
    .to_string()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn daily_json_counts_rolling_context() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, stderr) = sandbox.run(&[path_str(&file), "daily", "-j", "--heuristic"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let json: Value = serde_json::from_slice(&stdout).expect("json");
    let days = json.as_array().expect("array output");
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], "2024-03-10");
    // turn 1: in 1, out 2; turn 2: in 1 + 2 + 1, out 1
    assert_eq!(days[0]["input_tokens"], 5);
    assert_eq!(days[0]["output_tokens"], 3);
    assert_eq!(days[0]["messages"], 2);
    assert_eq!(days[0]["conversations"], 1);
    assert_eq!(days[0]["models"], json!(["gpt-4o"]));
    assert_eq!(days[1]["date"], "unknown");
    assert_eq!(days[1]["models"], json!(["foo-bar"]));
    assert_eq!(days[1]["cost"], 0.0);
}

#[test]
fn summary_json_reports_skips_and_range() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, stderr) = sandbox.run(&[path_str(&file), "summary", "--json", "--heuristic"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let json: Value = serde_json::from_slice(&stdout).expect("json");
    assert_eq!(json["processed"], 2);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["start_date"], "2024-03-10");
    assert_eq!(json["end_date"], "2024-03-10");
    assert_eq!(json["models"], json!(["foo-bar", "gpt-4o"]));
    assert!(json["cost"].as_f64().unwrap() > 0.0);
}

#[test]
fn models_json_marks_unpriced_slugs() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, _) = sandbox.run(&[path_str(&file), "models", "-j", "--heuristic"]);
    assert!(ok);
    let json: Value = serde_json::from_slice(&stdout).expect("json");
    let models = json.as_array().expect("array output");
    let foo = models.iter().find(|m| m["model"] == "foo-bar").expect("foo-bar row");
    assert_eq!(foo["priced"], false);
    assert_eq!(foo["category"], "unknown");
    let gpt = models.iter().find(|m| m["model"] == "gpt-4o").expect("gpt-4o row");
    assert_eq!(gpt["category"], "chat");
}

#[test]
fn hourly_json_places_usage_in_utc_hour() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, _) = sandbox.run(&[path_str(&file), "hourly", "-j", "--heuristic"]);
    assert!(ok);
    let json: Value = serde_json::from_slice(&stdout).expect("json");
    let hours = json.as_array().expect("array output");
    assert_eq!(hours.len(), 24);
    assert_eq!(hours[14]["messages"], 2);
    // the undated conversation has no hour of day
    assert_eq!(hours[0]["messages"], 0);
    let total: u64 = hours.iter().map(|h| h["messages"].as_u64().unwrap()).sum();
    assert_eq!(total, 2);
}

#[test]
fn default_table_output() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, _) = sandbox.run(&[path_str(&file), "--heuristic", "--no-color"]);
    assert!(ok);
    let text = String::from_utf8_lossy(&stdout);
    assert!(text.contains("2024-03-10"));
    assert!(text.contains("TOTAL"));
    assert!(text.contains("2 conversations processed (1 skipped)"));
    assert!(!text.contains("\x1b["));
}

#[test]
fn config_pricing_override_applies() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());
    sandbox.write(
        ".chatstats.toml",
        r#"
heuristic = true

[pricing.gpt-4o]
input = 1000000.0
output = 0.0
"#,
    );

    let (ok, stdout, stderr) = sandbox.run(&[path_str(&file), "-j"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    let json: Value = serde_json::from_slice(&stdout).expect("json");
    // $1 per input token, and heuristic counting came from the config
    let cost = json[0]["cost"].as_f64().expect("cost");
    assert!((cost - 5.0).abs() < 1e-9, "cost {cost}");
}

#[test]
fn bpe_tokenizer_end_to_end() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, stdout, stderr) = sandbox.run(&[path_str(&file), "summary", "-j", "--encoding", "cl100k_base"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    let json: Value = serde_json::from_slice(&stdout).expect("json");
    assert!(json["input_tokens"].as_u64().unwrap() > 0);
    assert_eq!(json["messages"], 3);
}

#[test]
fn non_array_input_fails() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", r#"{"conversations": []}"#);

    let (ok, _, stderr) = sandbox.run(&[path_str(&file), "--heuristic"]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Expected a JSON array"));
}

#[test]
fn invalid_json_fails() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", "[{");

    let (ok, _, stderr) = sandbox.run(&[path_str(&file)]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Invalid JSON"));
}

#[test]
fn missing_file_fails() {
    let sandbox = Sandbox::new();
    let missing = sandbox.dir.path().join("nope.json");

    let (ok, _, stderr) = sandbox.run(&[path_str(&missing)]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Failed to read"));
}

#[test]
fn unknown_encoding_fails() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("conversations.json", &export());

    let (ok, _, stderr) = sandbox.run(&[path_str(&file), "--encoding", "p50k"]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Unsupported encoding"));
}
