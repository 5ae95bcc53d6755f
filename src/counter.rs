use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use walkdir::WalkDir;

/// Sentinel recorded when a caption lacks an attribute field.
pub const MISSING: &str = "missing";

/// Field labels, in tuple order.
pub const ATTRIBUTE_LABELS: &[&str] = &["Winter Weather", "Hazardous Event"];

pub type AttributeTuple = [String; 2];

#[derive(Debug, Default)]
pub struct CountReport {
    /// Groups sorted by descending count, ties broken by lexical tuple order.
    pub groups: Vec<(AttributeTuple, u64)>,
    pub total: u64,
    pub unreadable: u64,
}

fn value_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Pulls the attribute tuple out of a caption document, substituting the
/// missing sentinel for absent fields.
pub fn extract_attributes(doc: &Value) -> AttributeTuple {
    let winter_weather = doc.get("weather").and_then(|w| w.get("winter weather"));
    let hazardous = doc.get("hazardous event").and_then(|h| h.get("present"));
    [value_label(winter_weather), value_label(hazardous)]
}

fn list_caption_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(OsStr::to_str) == Some("json"))
        .collect()
}

/// Tallies attribute combinations across a caption directory.
pub async fn run_count(captions_dir: &Path) -> Result<CountReport> {
    let is_dir = fs::metadata(captions_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        anyhow::bail!("Directory not found: {}", captions_dir.display());
    }

    let mut counts: HashMap<AttributeTuple, u64> = HashMap::new();
    let mut unreadable = 0u64;

    for path in list_caption_files(captions_dir) {
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) => {
                warn!("Error reading {}: {err}", path.display());
                unreadable += 1;
                continue;
            }
        };
        let doc: Value = match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(err) => {
                warn!("Error decoding JSON in {}: {err}", path.display());
                unreadable += 1;
                continue;
            }
        };

        *counts.entry(extract_attributes(&doc)).or_insert(0) += 1;
    }

    let total = counts.values().sum();
    let mut groups: Vec<(AttributeTuple, u64)> = counts.into_iter().collect();
    groups.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)));

    Ok(CountReport {
        groups,
        total,
        unreadable,
    })
}

/// Renders the tally as a fixed-width table. Deterministic for a given
/// report: same groups in, same bytes out.
pub fn render_table(report: &CountReport) -> String {
    let mut out = String::new();
    let rule = "-".repeat(55);

    out.push_str("Results:\n");
    out.push_str(&rule);
    out.push('\n');
    let _ = writeln!(
        out,
        "| {:<15} | {:<15} | {:<10} |",
        ATTRIBUTE_LABELS[0], ATTRIBUTE_LABELS[1], "Count"
    );
    out.push_str(&rule);
    out.push('\n');

    for (tuple, count) in &report.groups {
        let _ = writeln!(out, "| {:<15} | {:<15} | {:<10} |", tuple[0], tuple[1], count);
    }

    out.push_str(&rule);
    out.push('\n');
    let _ = writeln!(out, "\nTotal files counted: {}", report.total);
    if report.unreadable > 0 {
        let _ = writeln!(out, "Unreadable files: {}", report.unreadable);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_booleans_and_missing_sentinel() {
        let doc = json!({
            "weather": {"winter weather": true},
            "hazardous event": {"present": false},
        });
        assert_eq!(extract_attributes(&doc), ["true", "false"]);

        let sparse = json!({"weather": {}});
        assert_eq!(extract_attributes(&sparse), [MISSING, MISSING]);
    }

    #[test]
    fn string_attributes_pass_through_verbatim() {
        let doc = json!({
            "weather": {"winter weather": "snow"},
            "hazardous event": {"present": 3},
        });
        assert_eq!(extract_attributes(&doc), ["snow", "3"]);
    }

    #[tokio::test]
    async fn groups_sort_by_count_then_tuple() {
        let dir = tempfile::tempdir().unwrap();
        let docs = [
            ("a.json", json!({"weather": {"winter weather": true}, "hazardous event": {"present": true}})),
            ("b.json", json!({"weather": {"winter weather": true}, "hazardous event": {"present": true}})),
            ("c.json", json!({"weather": {"winter weather": false}, "hazardous event": {"present": true}})),
            ("d.json", json!({"weather": {"winter weather": false}, "hazardous event": {"present": false}})),
        ];
        for (name, doc) in &docs {
            std::fs::write(dir.path().join(name), doc.to_string()).unwrap();
        }

        let report = run_count(dir.path()).await.unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.groups.len(), 3);
        // Highest count first.
        assert_eq!(report.groups[0].0, ["true", "true"]);
        assert_eq!(report.groups[0].1, 2);
        // Equal counts fall back to lexical tuple order.
        assert_eq!(report.groups[1].0, ["false", "false"]);
        assert_eq!(report.groups[2].0, ["false", "true"]);
    }

    #[tokio::test]
    async fn unreadable_files_are_counted_separately() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.json"), "{}").unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();

        let report = run_count(dir.path()).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.unreadable, 1);
    }

    #[tokio::test]
    async fn rendered_report_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for (name, doc) in [
            ("x.json", json!({"weather": {"winter weather": true}, "hazardous event": {"present": false}})),
            ("y.json", json!({"weather": {"winter weather": false}, "hazardous event": {"present": true}})),
        ] {
            std::fs::write(dir.path().join(name), doc.to_string()).unwrap();
        }

        let first = render_table(&run_count(dir.path()).await.unwrap());
        let second = render_table(&run_count(dir.path()).await.unwrap());
        assert_eq!(first, second);
        assert!(first.contains("Total files counted: 2"));
    }
}
