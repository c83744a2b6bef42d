use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

const SNAPSHOT: &str = r#"{
  "start": "2024-01-01T00:00:00Z",
  "end": "2024-01-03T00:00:00Z",
  "output_dir": "/cluster/scratch/run-17",
  "config": {"model": "geo.gmm.Token"},
  "tests": [
    {
      "start": "2024-01-02T00:00:00Z",
      "end": "2024-01-03T00:00:00Z",
      "summary": {"tweets": 3, "located": 2, "mean_error": 12.5, "median_error": 10},
      "tweets": [
        {"id": 101, "located": true, "error": 15.0, "tokens": ["a", "b"],
         "estimate": {"mean": [1, 2]}},
        {"id": 102, "located": false, "tokens": []},
        {"id": 103, "located": true, "error": 10.0, "tokens": ["b", "c"]}
      ],
      "tokens": [
        {"id": "a", "points": 5, "model": {"type": "gaussian"}},
        {"id": "b", "points": 40},
        {"id": "c", "points": 12, "model": {"type": "gaussian"}},
        {"id": "d", "points": 99}
      ]
    },
    {
      "start": "2024-01-01T00:00:00Z",
      "end": "2024-01-02T00:00:00Z",
      "summary": {"tweets": 1, "located": 1, "mean_error": 3.25},
      "tweets": [
        {"id": 201, "located": true, "error": 3.25, "tokens": ["x"]}
      ],
      "tokens": [{"id": "x", "points": 7}]
    }
  ]
}"#;

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qreport"))
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("command runs")
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = run_cli(dir, args);
    assert!(
        output.status.success(),
        "command failed: args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn run_error(dir: &Path, args: &[&str]) -> Value {
    let output = run_cli(dir, args);
    assert!(!output.status.success(), "command unexpectedly succeeded: {args:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().expect("error line");
    serde_json::from_str(last).expect("json error")
}

fn read_table(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .expect("read table")
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

fn seed(dir: &Path) {
    fs::write(dir.join("run.json"), SNAPSHOT).expect("seed snapshot");
}

#[test]
fn report_writes_all_three_tables_to_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let outcome = run_json(
        dir,
        &[
            "report",
            "run.json",
            "--tweets",
            ":",
            "--tokens",
            "-1",
            "--test-out",
            "out/tests.tsv",
            "--tweet-out",
            "out/tweets.tsv",
            "--token-out",
            "out/tokens.tsv",
        ],
    );
    assert_eq!(outcome["status"], "ok");
    assert_eq!(outcome["tables"].as_array().expect("tables").len(), 3);

    let tests = read_table(&dir.join("out/tests.tsv"));
    assert_eq!(
        tests[0],
        vec!["test", "start", "end", "tweets", "located", "mean_error", "median_error"]
    );
    assert_eq!(tests[1][0], "1");
    assert_eq!(tests[1][5], "3.25");
    assert_eq!(tests[1][6], "");
    assert_eq!(tests[2][0], "0");

    let tweets = read_table(&dir.join("out/tweets.tsv"));
    let ids: Vec<&str> = tweets[1..].iter().map(|row| row[2].as_str()).collect();
    assert_eq!(ids, vec!["201", "103", "101"]);

    let tokens = read_table(&dir.join("out/tokens.tsv"));
    let ids: Vec<&str> = tokens[1..].iter().map(|row| row[1].as_str()).collect();
    assert_eq!(ids, vec!["d", "x"]);
}

#[test]
fn stdout_destination_and_negative_selectors() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let output = run_cli(
        dir,
        &["report", "run.json", "--tests", "-1", "--tweets", "-1:", "--tweet-out", "-"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(
        stdout,
        "test\ttweet\tid\tlocated\terror\ttokens\n1\t0\t201\ttrue\t3.25\t1\n"
    );
}

#[test]
fn include_fails_reports_unlocated_tweets_last() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let args = ["report", "run.json", "--tests", "0", "--tweets", ":", "--tweet-out", "-"];
    let output = run_cli(dir, &[&args[..], &["--include-fails"][..]].concat());
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let last = stdout.lines().last().expect("row");
    assert_eq!(last, "0\t1\t102\tfalse\t\t0");

    fs::write(dir.join(".qreport.yml"), "include_fails: true\n").expect("config");
    let output = run_cli(dir, &args);
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).expect("utf8").lines().count(), 4);

    let output = run_cli(dir, &[&args[..], &["--no-include-fails"][..]].concat());
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(stdout.lines().count(), 3);
    assert!(!stdout.contains("\t102\t"));
}

#[test]
fn stdout_tweet_table_keeps_derived_tokens_out_of_the_stream() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let output = run_cli(
        dir,
        &[
            "report",
            "run.json",
            "--tests",
            "0",
            "--tweets",
            "0",
            "--tweet-out",
            "-",
            "--tweet-tokens",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.lines().all(|line| line.split('\t').count() == 6));

    let tokens = read_table(&dir.join("tweets.tokens.tsv"));
    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(|row| row.len() == 4));
}

#[test]
fn tweet_tokens_and_geofiles_cascade_into_derived_token_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let outcome = run_json(
        dir,
        &[
            "report",
            "run.json",
            "--tests",
            "0",
            "--tweets",
            "0",
            "--tweet-out",
            "tweets.tsv",
            "--tweet-tokens",
            "--geofiles",
            "--geofile-width",
            "400",
        ],
    );
    assert_eq!(outcome["cascaded_tokens"], 2);
    assert_eq!(outcome["artifacts_written"], 2);
    assert_eq!(outcome["artifacts_skipped"], 1);

    let tokens = read_table(&dir.join("tweets.tokens.tsv"));
    let ids: Vec<&str> = tokens[1..].iter().map(|row| row[1].as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);

    let tweet_geo: Value =
        serde_json::from_slice(&fs::read(dir.join("tweets.0.geo.json")).expect("tweet geofile"))
            .expect("json");
    assert_eq!(tweet_geo["width_px"], 400);
    assert_eq!(tweet_geo["label"], "101");
    assert!(dir.join("tweets.tokens.1.geo.json").exists());
    assert!(!dir.join("tweets.tokens.0.geo.json").exists());
}

#[test]
fn selector_syntax_error_aborts_before_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let err = run_error(
        dir,
        &["report", "run.json", "--tweets", "0:two", "--test-out", "tests.tsv"],
    );
    assert_eq!(err["error"]["code"], "selector_syntax");
    assert!(err["error"]["message"].as_str().expect("message").contains("0:two"));
    assert!(!dir.join("tests.tsv").exists());
}

#[test]
fn unresolved_policy_from_config_file_aborts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    let broken = SNAPSHOT.replace(r#""tokens": ["x"]"#, r#""tokens": ["x", "ghost"]"#);
    fs::write(dir.join("run.json"), broken).expect("seed");
    fs::write(dir.join(".qreport.yml"), "unresolved: abort\n").expect("config");

    let err = run_error(dir, &["report", "run.json", "--tweets", ":", "--tweet-out", "t.tsv"]);
    assert_eq!(err["error"]["code"], "unresolved_token_reference");
    assert!(!dir.join("t.tsv").exists());

    let outcome = run_json(
        dir,
        &["report", "run.json", "--tweets", ":", "--tweet-out", "t.tsv", "--unresolved", "skip"],
    );
    assert_eq!(outcome["status"], "partial");
    assert_eq!(outcome["unresolved"][0]["token"], "ghost");
    assert_eq!(read_table(&dir.join("t.tsv")).len(), 3);
}

#[test]
fn empty_snapshot_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    fs::write(dir.join("empty.json"), r#"{"tests": []}"#).expect("seed");
    let err = run_error(dir, &["report", "empty.json", "--test-out", "-"]);
    assert_eq!(err["error"]["code"], "empty_result");
}

#[test]
fn pack_then_info_through_compressed_suffix() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();
    seed(dir);

    let packed = run_json(dir, &["pack", "run.json"]);
    assert_eq!(packed["output"], "run.json.zst");
    fs::remove_file(dir.join("run.json")).expect("remove plain");

    let info = run_json(dir, &["info", "run.json"]);
    assert_eq!(info["tests"], 2);
    assert_eq!(info["tweets"], 4);
    assert_eq!(info["tokens"], 5);
    assert_eq!(info["elapsed"], "48:00:00");
    assert_eq!(info["first_test_start"], "2024-01-01T00:00:00Z");
    let output_dir = info["output_dir"].as_str().expect("output dir");
    assert_ne!(output_dir, "/cluster/scratch/run-17");
}
