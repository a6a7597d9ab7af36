use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn trk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("trk");
    path
}

const BASIC_LABELS: &str = "Department,Search Term,Search Frequency Rank";
const EXTENDED_LABELS: &str = "Department,Search Term,Search Frequency Rank,\
#1 Clicked ASIN,#1 Product Title,#1 Click Share,#1 Conversion Share,\
#2 Clicked ASIN,#2 Product Title,#2 Click Share,#2 Conversion Share,\
#3 Clicked ASIN,#3 Product Title,#3 Click Share,#3 Conversion Share";

fn header(date: &str) -> String {
    format!(
        "Department=[All],Reporting Range=[Daily],Search Scope=[All],Category=[All],Viewing=[{}]",
        date
    )
}

fn write_report(dir: &Path, name: &str, date: &str, labels: &str, rows: &[&str]) {
    let mut content = format!("{}\n{}\n", header(date), labels);
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(dir.join(name), content).unwrap();
}

/// Two daily basic reports and two daily extended reports in separate dirs.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let basic = tmp.path().join("basic");
    let extended = tmp.path().join("extended");
    fs::create_dir_all(&basic).unwrap();
    fs::create_dir_all(&extended).unwrap();

    write_report(
        &basic,
        "2024-01-01.csv",
        "2024-01-01",
        BASIC_LABELS,
        &["Dept,red shoes,5", "Dept,boots,\"1,200\"", "Dept,running shoe,40"],
    );
    write_report(
        &basic,
        "2024-01-02.csv",
        "2024-01-02",
        BASIC_LABELS,
        &["Dept,red shoes,3", "Dept,boots,900"],
    );

    write_report(
        &extended,
        "2024-01-01.csv",
        "2024-01-01",
        EXTENDED_LABELS,
        &[
            "Dept,red shoes,5,B0001,Red Shoe,12%,3%,B000XYZ,Scarlet Shoe,8%,2%,B0003,Ruby Shoe,4%,1%",
            "Dept,boots,9,B0009,Boot,20%,5%,,,,,,,,",
        ],
    );
    write_report(
        &extended,
        "2024-01-02.csv",
        "2024-01-02",
        EXTENDED_LABELS,
        &["Dept,red shoes,3,B0001,Red Shoe,15%,4%,B0002,Crimson Shoe,9%,2%,,,,"],
    );

    (tmp, basic, extended)
}

fn run_trk(args: &[&str]) -> (String, String, bool) {
    let binary = trk_binary();
    let output = Command::new(&binary)
        .args(args)
        .env_remove("TERMRANK_LOG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run trk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn csv_lines(stdout: &str) -> Vec<&str> {
    stdout.lines().filter(|l| !l.is_empty()).collect()
}

#[test]
fn test_build_reports_counts() {
    let (_tmp, basic, _) = setup_test_env();
    let (stdout, stderr, success) = run_trk(&["build", "--source", basic.to_str().unwrap()]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("reports:   2"));
    assert!(stdout.contains("terms:     3"));
    assert!(stdout.contains("snapshots: 5"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_query_by_rank_to_stdout() {
    let (_tmp, basic, _) = setup_test_env();
    for backend in ["associative", "columnar"] {
        let (stdout, stderr, success) = run_trk(&[
            "query",
            "--source",
            basic.to_str().unwrap(),
            "--backend",
            backend,
            "--by",
            "by-rank",
            "--policy",
            "loose",
            "4",
            "--stdout",
        ]);
        assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
        let lines = csv_lines(&stdout);
        assert_eq!(lines[0], "site,search_term,min_rank,2024-01-01,2024-01-02");
        assert_eq!(lines[1], "Dept,red shoes,3,5,3");
        assert_eq!(lines.len(), 2);
    }
}

#[test]
fn test_query_writes_labelled_file() {
    let (tmp, basic, _) = setup_test_env();
    let out = tmp.path().join("results");
    let (stdout, stderr, success) = run_trk(&[
        "query",
        "--source",
        basic.to_str().unwrap(),
        "--by",
        "by-term",
        "--policy",
        "loose",
        "shoe",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 matched"));

    let files: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("result-loose-by-term-shoe++-associative-"));
    assert!(files[0].ends_with(".csv"));

    let content = fs::read_to_string(out.join(&files[0])).unwrap();
    let lines = csv_lines(&content);
    assert_eq!(lines[0], "site,search_term,min_rank,2024-01-01,2024-01-02");
    assert_eq!(lines[1], "Dept,red shoes,,5,3");
    assert_eq!(lines[2], "Dept,running shoe,,40,");
}

#[test]
fn test_query_by_product_exact() {
    let (_tmp, _, extended) = setup_test_env();
    let (stdout, stderr, success) = run_trk(&[
        "query",
        "--source",
        extended.to_str().unwrap(),
        "--backend",
        "columnar",
        "--by",
        "by-product",
        "--policy",
        "exact",
        "B000XYZ",
        "--stdout",
    ]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    let lines = csv_lines(&stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "Dept,red shoes,5,2024-01-01,2,B000XYZ,Scarlet Shoe,8%,2%"
    );
}

#[test]
fn test_query_json_format() {
    let (_tmp, _, extended) = setup_test_env();
    let (stdout, stderr, success) = run_trk(&[
        "query",
        "--source",
        extended.to_str().unwrap(),
        "--by",
        "by-term-with-products",
        "--policy",
        "exact",
        "boots",
        "--format",
        "json",
        "--stdout",
    ]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["2024-01-01"], "B0009");
    assert_eq!(rows[1]["2024-01-01"], serde_json::Value::Null);
    assert_eq!(rows[0]["min_rank"], 9);
}

#[test]
fn test_snapshot_round_trip_through_cli() {
    let (tmp, basic, _) = setup_test_env();
    let snapshot = basic.join("week.index.json");
    let (_, stderr, success) = run_trk(&[
        "build",
        "--source",
        basic.to_str().unwrap(),
        "--backend",
        "columnar",
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);
    assert!(success, "build failed: {}", stderr);
    assert!(snapshot.exists());

    // Reports are gone; the snapshot alone must answer.
    fs::remove_file(basic.join("2024-01-01.csv")).unwrap();
    fs::remove_file(basic.join("2024-01-02.csv")).unwrap();
    let (stdout, stderr, success) = run_trk(&[
        "query",
        "--source",
        basic.to_str().unwrap(),
        "--backend",
        "columnar",
        "--by",
        "by-rank",
        "--policy",
        "exact",
        "1000",
        "--stdout",
    ]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    let lines = csv_lines(&stdout);
    assert_eq!(lines[1], "Dept,red shoes,3,5,3");
    assert_eq!(lines[2], "Dept,running shoe,40,40,");
    drop(tmp);
}

#[test]
fn test_stats() {
    let (_tmp, _, extended) = setup_test_env();
    let (stdout, stderr, success) =
        run_trk(&["stats", "--source", extended.to_str().unwrap(), "--view", "extended"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Terms:       2"));
    assert!(stdout.contains("Snapshots:   3"));
    assert!(stdout.contains("2024-01-01 .. 2024-01-02"));
}

#[test]
fn test_config_file_supplies_source_and_backend() {
    let (tmp, basic, _) = setup_test_env();
    let config_path = tmp.path().join("trk.toml");
    fs::write(
        &config_path,
        format!(
            "[source]\ndir = \"{}\"\n\n[engine]\nbackend = \"columnar\"\n",
            basic.display()
        ),
    )
    .unwrap();
    let (stdout, stderr, success) = run_trk(&[
        "--config",
        config_path.to_str().unwrap(),
        "stats",
    ]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Backend:     columnar"));
}

#[test]
fn test_mean_policy_on_terms_fails() {
    let (_tmp, basic, _) = setup_test_env();
    let (_, stderr, success) = run_trk(&[
        "query",
        "--source",
        basic.to_str().unwrap(),
        "--by",
        "by-term",
        "--policy",
        "mean",
        "shoe",
        "--stdout",
    ]);
    assert!(!success);
    assert!(stderr.contains("Unsupported combination"));
}

#[test]
fn test_malformed_report_fails_build() {
    let (_tmp, basic, _) = setup_test_env();
    fs::write(
        basic.join("2024-01-03.csv"),
        "Department=[All],Reporting Range=[Daily]\nDepartment,Search Term,Search Frequency Rank\nDept,hat,7\n",
    )
    .unwrap();
    let (_, stderr, success) = run_trk(&["build", "--source", basic.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("2024-01-03.csv"));
}

#[test]
fn test_missing_source_dir() {
    let (_, stderr, success) = run_trk(&["stats", "--source", "/nonexistent/reports"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}
