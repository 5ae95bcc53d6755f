use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use vid_caption_tools::counter::{render_table, run_count};
use vid_caption_tools::normalizer::run_cleanup;

fn setup_dirs(root: &Path) -> (PathBuf, PathBuf) {
    let captions = root.join("captions");
    let input = root.join("input");
    std::fs::create_dir_all(&captions).unwrap();
    std::fs::create_dir_all(&input).unwrap();
    (captions, input)
}

/// Directory with a valid caption, a trailing-comma caption and an orphan:
/// after cleanup the orphan is gone, the defect is repaired, and the counter
/// reports exactly the two surviving groups.
#[tokio::test]
async fn normalize_then_count_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (captions, input) = setup_dirs(dir.path());

    std::fs::write(input.join("a.mp4"), b"").unwrap();
    std::fs::write(input.join("b.mov"), b"").unwrap();

    std::fs::write(
        captions.join("a.json"),
        json!({
            "weather": {"winter weather": "snow"},
            "hazardous event": {"present": true},
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        captions.join("b.json"),
        "{\n  \"weather\": {\"winter weather\": \"clear\"},\n  \"hazardous event\": {\"present\": false},\n}",
    )
    .unwrap();
    // No c.* video exists, so this caption is an orphan.
    std::fs::write(captions.join("c.json"), "{\"weather\": {}}").unwrap();

    let report = run_cleanup(&captions, &input).await.unwrap();
    assert_eq!(report.deleted_orphans, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.unrepaired, 0);

    assert!(!captions.join("c.json").exists());

    let a: Value =
        serde_json::from_str(&std::fs::read_to_string(captions.join("a.json")).unwrap()).unwrap();
    assert_eq!(a["weather"]["winter weather"], "snow");
    assert_eq!(a["hazardous event"]["present"], json!(true));

    let b_raw = std::fs::read_to_string(captions.join("b.json")).unwrap();
    let b: Value = serde_json::from_str(&b_raw).unwrap();
    assert_eq!(b["weather"]["winter weather"], "clear");
    assert!(!b_raw.contains(",\n}"));

    let count = run_count(&captions).await.unwrap();
    assert_eq!(count.total, 2);
    assert_eq!(count.unreadable, 0);
    assert_eq!(count.groups.len(), 2);
    // Equal counts: lexical tuple order decides.
    assert_eq!(count.groups[0].0, ["clear", "false"]);
    assert_eq!(count.groups[0].1, 1);
    assert_eq!(count.groups[1].0, ["snow", "true"]);
    assert_eq!(count.groups[1].1, 1);
}

/// Running the normalizer twice leaves the directory byte-identical.
#[tokio::test]
async fn cleanup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (captions, input) = setup_dirs(dir.path());

    std::fs::write(input.join("a.mp4"), b"").unwrap();
    std::fs::write(input.join("b.avi"), b"").unwrap();
    std::fs::write(
        captions.join("a.json"),
        "{\"description\": \"plowed road\", \"usage_metadata\": {\"total_tokens\": 4},}",
    )
    .unwrap();
    std::fs::write(
        captions.join("b.json"),
        json!({"hazardous event": {"present": true}}).to_string(),
    )
    .unwrap();
    std::fs::write(captions.join("gone.json"), "{}").unwrap();

    run_cleanup(&captions, &input).await.unwrap();
    let snapshot = |dir: &Path| -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
            .into_iter()
            .map(|p| {
                (
                    p.file_name().unwrap().to_string_lossy().into_owned(),
                    std::fs::read(&p).unwrap(),
                )
            })
            .collect()
    };

    let first = snapshot(&captions);
    let second_report = run_cleanup(&captions, &input).await.unwrap();
    let second = snapshot(&captions);

    assert_eq!(first, second);
    assert_eq!(second_report.deleted_orphans, 0);
    assert_eq!(second_report.repaired, 0);
}

/// Counter output over an unchanged directory never varies between runs.
#[tokio::test]
async fn count_report_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let (captions, input) = setup_dirs(dir.path());

    for (stem, winter, hazard) in [
        ("a", json!(true), json!(true)),
        ("b", json!(true), json!(true)),
        ("c", json!(false), json!(true)),
        ("d", json!(false), json!(false)),
    ] {
        std::fs::write(input.join(format!("{stem}.mp4")), b"").unwrap();
        std::fs::write(
            captions.join(format!("{stem}.json")),
            json!({
                "weather": {"winter weather": winter},
                "hazardous event": {"present": hazard},
            })
            .to_string(),
        )
        .unwrap();
    }

    run_cleanup(&captions, &input).await.unwrap();

    let first = render_table(&run_count(&captions).await.unwrap());
    let second = render_table(&run_count(&captions).await.unwrap());
    assert_eq!(first, second);

    let lines: Vec<&str> = first.lines().collect();
    let true_true = lines
        .iter()
        .position(|l| l.contains("| true ") && l.matches("true").count() == 2)
        .unwrap();
    let false_false = lines
        .iter()
        .position(|l| l.matches("false").count() == 2)
        .unwrap();
    // The twice-seen combination sorts above the singletons.
    assert!(true_true < false_false);
}
