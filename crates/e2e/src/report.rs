//! Reporters: console list, JSON results file and a static HTML page

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::info;

use crate::config::{ReporterKind, SuiteConfig};
use crate::error::E2eResult;
use crate::runner::{Outcome, TestResult, TestSuiteResult};

pub const JSON_REPORT_FILE: &str = "results.json";
pub const HTML_REPORT_FILE: &str = "index.html";

/// Run every reporter in `config.reporters`, returning the files written
pub fn write_reports(suite: &TestSuiteResult, config: &SuiteConfig) -> E2eResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for reporter in &config.reporters {
        match reporter {
            ReporterKind::List => print!("{}", render_list(suite)),
            ReporterKind::Json => written.push(write_json(suite, &config.output_dir)?),
            ReporterKind::Html => written.push(write_html(suite, &config.report_dir)?),
        }
    }
    Ok(written)
}

fn outcome_marker(outcome: Outcome) -> String {
    match outcome {
        Outcome::Passed => "✓".green().to_string(),
        Outcome::Flaky => "±".yellow().to_string(),
        Outcome::Failed => "✗".red().to_string(),
        Outcome::TimedOut => "⏱".red().to_string(),
    }
}

/// One line per result, failure details, then the summary
pub fn render_list(suite: &TestSuiteResult) -> String {
    let mut out = String::new();
    for result in &suite.results {
        let _ = writeln!(
            out,
            "  {} {} {} {}",
            outcome_marker(result.outcome),
            format!("[{}]", result.project).dimmed(),
            result.title,
            format!("({}ms)", result.duration_ms).dimmed()
        );
    }

    let failures: Vec<&TestResult> = suite.failures().collect();
    if !failures.is_empty() {
        let _ = writeln!(out);
        for (i, result) in failures.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}) {} {}",
                i + 1,
                format!("[{}]", result.project).dimmed(),
                result.title.bold()
            );
            if let Some(error) = &result.error {
                let _ = writeln!(out, "     {}", error.red());
            }
            for artifact in result.artifacts() {
                let _ = writeln!(out, "     {} {}", "attachment:".dimmed(), artifact.display());
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", format!("{} passed", suite.passed).green());
    if suite.flaky > 0 {
        let _ = writeln!(out, "  {}", format!("{} flaky", suite.flaky).yellow());
    }
    if suite.failed > 0 {
        let _ = writeln!(out, "  {}", format!("{} failed", suite.failed).red());
    }
    if suite.timed_out > 0 {
        let _ = writeln!(out, "  {}", format!("{} timed out", suite.timed_out).red());
    }
    let _ = writeln!(
        out,
        "  {}",
        format!("{} total in {:.1}s", suite.total, suite.duration_ms as f64 / 1000.0).dimmed()
    );
    out
}

/// `<output_dir>/results.json`
pub fn write_json(suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join(JSON_REPORT_FILE);
    let json = serde_json::to_string_pretty(suite)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Self-contained HTML page with one row per result
pub fn render_html(suite: &TestSuiteResult) -> String {
    let mut rows = String::new();
    for result in &suite.results {
        let status = match result.outcome {
            Outcome::Passed => "passed",
            Outcome::Flaky => "flaky",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timedout",
        };
        let error = result
            .error
            .as_deref()
            .map(|e| format!("<pre>{}</pre>", escape_html(e)))
            .unwrap_or_default();
        let notes: String = result
            .annotations
            .iter()
            .map(|a| format!("<div class=\"note\">{}: {}</div>", escape_html(&a.kind), escape_html(&a.description)))
            .collect();
        let links: String = result
            .artifacts()
            .map(|p| {
                let href = escape_html(&p.display().to_string());
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| href.clone());
                format!("<a href=\"{}\">{}</a> ", href, escape_html(&name))
            })
            .collect();

        let _ = writeln!(
            rows,
            "<tr class=\"{status}\"><td>{outcome}</td><td>{project}</td><td>{title}<br><small>{group}</small>{notes}</td><td>{duration}ms</td><td>{retries}</td><td>{error}{links}</td></tr>",
            status = status,
            outcome = result.outcome,
            project = escape_html(&result.project),
            title = escape_html(&result.title),
            group = escape_html(&result.group),
            notes = notes,
            duration = result.duration_ms,
            retries = result.retries(),
            error = error,
            links = links,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>To-Do E2E Report</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid #ddd; padding: 6px; vertical-align: top; text-align: left; }}
tr.passed td:first-child {{ color: #2e7d32; }}
tr.flaky td:first-child {{ color: #f9a825; }}
tr.failed td:first-child, tr.timedout td:first-child {{ color: #c62828; }}
pre {{ white-space: pre-wrap; margin: 0; }}
.note {{ color: #555; font-size: 0.9em; }}
</style>
</head>
<body>
<h1>To-Do E2E Report</h1>
<p>Started {started} &middot; driver {driver} &middot; {base_url} &middot; {workers} worker(s) &middot; {duration:.1}s</p>
<p class="summary">{passed} passed, {flaky} flaky, {failed} failed, {timed_out} timed out, {total} total</p>
<table>
<tr><th>Outcome</th><th>Project</th><th>Test</th><th>Duration</th><th>Retries</th><th>Details</th></tr>
{rows}</table>
</body>
</html>
"#,
        started = suite.started_at.to_rfc3339(),
        driver = escape_html(&suite.driver),
        base_url = escape_html(&suite.base_url),
        workers = suite.workers,
        duration = suite.duration_ms as f64 / 1000.0,
        passed = suite.passed,
        flaky = suite.flaky,
        failed = suite.failed,
        timed_out = suite.timed_out,
        total = suite.total,
        rows = rows,
    )
}

/// `<report_dir>/index.html`
pub fn write_html(suite: &TestSuiteResult, report_dir: &Path) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(report_dir)?;
    let path = report_dir.join(HTML_REPORT_FILE);
    std::fs::write(&path, render_html(suite))?;
    info!("HTML report written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::error::FailureKind;
    use crate::runner::{AttemptResult, AttemptStatus};
    use crate::scenarios::Annotation;

    fn result(id: &str, outcome: Outcome, error: Option<&str>) -> TestResult {
        let status = if outcome.is_success() {
            AttemptStatus::Passed
        } else {
            AttemptStatus::Failed
        };
        TestResult {
            id: id.into(),
            title: format!("{} - Some <title>", id),
            group: "Edge Cases".into(),
            project: "chromium".into(),
            outcome,
            duration_ms: 12,
            attempts: vec![AttemptResult {
                retry: 0,
                status,
                duration_ms: 12,
                error: error.map(String::from),
                error_kind: error.map(|_| FailureKind::Assertion),
                artifacts: error
                    .map(|_| vec![PathBuf::from("test-results/x/test-failed-1.html")])
                    .unwrap_or_default(),
            }],
            annotations: vec![Annotation {
                kind: "load-time".into(),
                description: "Page load time: 3ms".into(),
            }],
            error: error.map(String::from),
            error_kind: error.map(|_| FailureKind::Assertion),
        }
    }

    fn suite() -> TestSuiteResult {
        TestSuiteResult {
            started_at: Utc::now(),
            driver: "simulated".into(),
            base_url: "http://todo.test/".into(),
            workers: 2,
            total: 2,
            passed: 1,
            flaky: 0,
            failed: 1,
            timed_out: 0,
            duration_ms: 1500,
            results: vec![
                result("TC001", Outcome::Passed, None),
                result("TC002", Outcome::Failed, Some("expected <li> & friends")),
            ],
        }
    }

    #[test]
    fn test_list_reporter_mentions_failures() {
        let out = render_list(&suite());
        assert!(out.contains("TC001 - Some <title>"));
        assert!(out.contains("expected <li> & friends"));
        assert!(out.contains("test-failed-1.html"));
        assert!(out.contains("1 failed"));
        assert!(out.contains("2 total in 1.5s"));
    }

    #[test]
    fn test_html_is_escaped() {
        let html = render_html(&suite());
        assert!(html.contains("TC002 - Some &lt;title&gt;"));
        assert!(html.contains("expected &lt;li&gt; &amp; friends"));
        assert!(html.contains("<tr class=\"failed\">"));
        assert!(html.contains("load-time: Page load time: 3ms"));
    }

    #[test]
    fn test_write_reports_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SuiteConfig::default();
        config.output_dir = dir.path().join("test-results");
        config.report_dir = dir.path().join("playwright-report");
        config.reporters = vec![ReporterKind::Json, ReporterKind::Html];

        let written = write_reports(&suite(), &config).unwrap();
        assert_eq!(
            written,
            vec![
                config.output_dir.join(JSON_REPORT_FILE),
                config.report_dir.join(HTML_REPORT_FILE)
            ]
        );

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"][1]["outcome"], "failed");
        assert_eq!(json["results"][1]["error_kind"], "assertion");
        assert_eq!(json["results"][0]["annotations"][0]["type"], "load-time");
    }
}
