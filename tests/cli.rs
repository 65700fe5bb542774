use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn harvest_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_harvest"))
}

fn write_config(dir: &Path, oai_url: &str, es_url: &str, extra: &str) -> PathBuf {
    let path = dir.join("harvest.toml");
    fs::write(
        &path,
        format!(
            r#"[elasticsearch]
url = "{es_url}"
timeout_secs = 5

[index]
name = "papers"

[oai]
base_url = "{oai_url}/oai2"
timeout_secs = 5
delay_ms = 0

{extra}
"#
        ),
    )
    .unwrap();
    path
}

/// Run the binary in `dir` with store env vars cleared; returns
/// (stdout, stderr, success).
fn run_harvest(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(harvest_binary())
        .args(args)
        .current_dir(dir)
        .env_remove("ELASTICSEARCH_URL")
        .env_remove("ELASTICSEARCH_CLOUD_ID")
        .env_remove("ELASTICSEARCH_API_KEY")
        .env_remove("ELASTICSEARCH_USER")
        .env_remove("ELASTICSEARCH_PASSWORD")
        .env_remove("ES_INDEX")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run harvest");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

async fn run_harvest_async(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let dir = dir.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_harvest(&dir, &refs)
    })
    .await
    .unwrap()
}

fn oai_page(records: &str, token: Option<&str>) -> String {
    let token = token
        .map(|t| format!(r#"<resumptionToken cursor="0" completeListSize="2">{t}</resumptionToken>"#))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2026-10-17T00:00:00Z</responseDate>
  <ListRecords>{records}{token}</ListRecords>
</OAI-PMH>"#
    )
}

fn oai_record(id: &str, created: &str, categories: &str) -> String {
    format!(
        r#"<record>
  <header><identifier>oai:arXiv.org:{id}</identifier></header>
  <metadata>
    <arXiv xmlns="http://arxiv.org/OAI/arXiv/">
      <id>{id}</id><created>{created}</created>
      <authors><author><keyname>Hopper</keyname><forenames>Grace</forenames></author></authors>
      <title>Paper {id}</title><categories>{categories}</categories>
      <abstract>Abstract of {id}.</abstract>
    </arXiv>
  </metadata>
</record>"#
    )
}

#[test]
fn sync_requires_a_range() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_harvest(tmp.path(), &["sync"]);
    assert!(!ok);
    assert!(stderr.contains("--from") || stderr.contains("--start"), "{}", stderr);
}

#[test]
fn mixed_range_modes_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let (_, _, ok) = run_harvest(
        tmp.path(),
        &["sync", "--from", "2026-01-01", "--until", "2026-01-31", "--start", "2026-01", "--end", "2026-02"],
    );
    assert!(!ok);
}

#[test]
fn backfill_flags_are_rejected_for_a_single_range() {
    let tmp = TempDir::new().unwrap();
    for flag in ["--resume", "--continue-on-error"] {
        let (_, stderr, ok) = run_harvest(
            tmp.path(),
            &["sync", "--from", "2026-01-01", "--until", "2026-01-31", flag, "--dry-run"],
        );
        assert!(!ok, "{} was accepted", flag);
        assert!(stderr.contains("--start"), "{}", stderr);
    }
}

#[test]
fn invalid_dates_fail_before_any_network_call() {
    let tmp = TempDir::new().unwrap();
    // Nothing listens here; reaching the network would fail differently.
    let config = write_config(tmp.path(), "http://127.0.0.1:9", "http://127.0.0.1:9", "");
    let config = config.to_str().unwrap();

    let (_, stderr, ok) = run_harvest(
        tmp.path(),
        &["--config", config, "sync", "--from", "2026-02-01", "--until", "2026-01-01"],
    );
    assert!(!ok);
    assert!(stderr.contains("invalid sync range"), "{}", stderr);

    let (_, stderr, ok) = run_harvest(
        tmp.path(),
        &["--config", config, "sync", "--start", "2024-13", "--end", "2025-01"],
    );
    assert!(!ok);
    assert!(stderr.contains("2024-13"), "{}", stderr);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_harvest(tmp.path(), &["--config", "nope.toml", "ping"]);
    assert!(!ok);
    assert!(stderr.contains("nope.toml"), "{}", stderr);
}

#[test]
fn dry_run_prints_month_plan() {
    let tmp = TempDir::new().unwrap();
    let (stdout, stderr, ok) = run_harvest(
        tmp.path(),
        &["sync", "--start", "2024-01", "--end", "2024-03", "--cs-only", "--dry-run"],
    );
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("2024-01  2024-01-01..2024-01-31"));
    assert!(stdout.contains("2024-02  2024-02-01..2024-02-29"));
    assert!(stdout.contains("2024-03  2024-03-01..2024-03-31"));
    assert!(stdout.contains("2024-01..2024-03 (3 months)"));
    assert!(stdout.contains("3 window(s); categories: cs."));
}

#[tokio::test(flavor = "multi_thread")]
async fn ping_prints_cluster_version() {
    let es = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cluster_name": "papers-cluster",
            "version": { "number": "8.15.1" }
        })))
        .mount(&es)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9", &es.uri(), "");
    let (stdout, stderr, ok) =
        run_harvest_async(tmp.path(), &["--config", config.to_str().unwrap(), "ping"]).await;
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("Connected to Elasticsearch: 8.15.1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_range_end_to_end() {
    let oai = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("metadataPrefix", "arXiv"))
        .and(query_param("from", "2026-01-01"))
        .and(query_param("until", "2026-01-31"))
        .and(query_param_is_missing("resumptionToken"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(
            &format!(
                "{}{}",
                oai_record("2601.00001v1", "2026-01-03", "cs.DS"),
                oai_record("2512.00042", "2025-12-30", "cs.DS"),
            ),
            Some("tok-1"),
        )))
        .expect(1)
        .mount(&oai)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("resumptionToken", "tok-1"))
        .and(query_param_is_missing("metadataPrefix"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(
            &format!(
                "{}{}",
                oai_record("2601.00002", "2026-01-20", "math.CO cs.LG"),
                oai_record("2601.00003", "2026-01-21", "math.CO"),
            ),
            None,
        )))
        .expect(1)
        .mount(&oai)
        .await;

    let es = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/papers"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&es)
        .await;
    Mock::given(method("PUT"))
        .and(path("/papers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&es)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": [] })),
        )
        .expect(2)
        .mount(&es)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &oai.uri(), &es.uri(), "");
    let (stdout, stderr, ok) = run_harvest_async(
        tmp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "sync",
            "--from",
            "2026-01-01",
            "--until",
            "2026-01-31",
            "--cs-only",
        ],
    )
    .await;

    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("Created index 'papers'"), "{}", stdout);
    assert!(stdout.contains("Done. Indexed 2 papers into 'papers'"), "{}", stdout);
    assert!(stderr.contains(">> 2026-01-01..2026-01-31"), "{}", stderr);
    assert!(stderr.contains("  p1: +1 (total 1)"), "{}", stderr);
    assert!(stderr.contains("  p2: +1 (total 2)"), "{}", stderr);

    let bulks: Vec<String> = es
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/_bulk")
        .map(|r| String::from_utf8(r.body).unwrap())
        .collect();
    assert!(bulks[0].contains(r#""_id":"2601.00001""#));
    assert!(!bulks.iter().any(|b| b.contains("2512.00042")));
    assert!(!bulks.iter().any(|b| b.contains("2601.00003")));
}

#[tokio::test(flavor = "multi_thread")]
async fn backfill_abort_exits_non_zero_and_names_the_month() {
    let oai = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("from", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(
            &oai_record("2401.00001", "2024-01-05", "cs.DS"),
            None,
        )))
        .mount(&oai)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("from", "2024-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><error code="badArgument">Illegal date</error></OAI-PMH>"#,
        ))
        .mount(&oai)
        .await;

    let es = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&es)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": [] })),
        )
        .mount(&es)
        .await;

    let tmp = TempDir::new().unwrap();
    let checkpoint = tmp.path().join("state").join("checkpoint.json");
    let extra = format!(
        "[backfill]\ncheckpoint_path = \"{}\"\n",
        checkpoint.display()
    );
    let config = write_config(tmp.path(), &oai.uri(), &es.uri(), &extra);

    let (_, stderr, ok) = run_harvest_async(
        tmp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "sync",
            "--start",
            "2024-01",
            "--end",
            "2024-03",
            "--quiet",
        ],
    )
    .await;

    assert!(!ok);
    assert!(stderr.contains("month 2024-02 failed"), "{}", stderr);
    assert!(stderr.contains("badArgument"), "{}", stderr);

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&checkpoint).unwrap()).unwrap();
    assert_eq!(saved["index"], "papers");
    assert_eq!(saved["months"]["2024-01"]["indexed"], 1);
    assert!(saved["months"].get("2024-02").is_none());
}
