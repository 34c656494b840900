//! HTML rendering of a [`Report`].
//!
//! Output depends only on the report value. The generation time and host each sit on their own
//! line so regenerated documents can be compared after dropping those two lines.

use super::{ImageCell, LogLink, Report, ReportRow};
use crate::known_issues::Classification;

/// Escape text for use in element content and double- or single-quoted attributes.
pub fn escape_html(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  for ch in input.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      other => out.push(other),
    }
  }
  out
}

pub fn render_html(report: &Report) -> String {
  let rows: String = report
    .rows
    .iter()
    .map(|row| render_row(row, &report.issue_url_base))
    .collect();

  let totals = &report.totals;
  let stale = if report.stale_registry_keys.is_empty() {
    String::new()
  } else {
    let items: String = report
      .stale_registry_keys
      .iter()
      .map(|key| format!("<li>{}</li>", escape_html(key)))
      .collect();
    format!(
      "\n    <h2>Known-issue entries without a test case</h2>\n    <ul class=\"stale\">{items}</ul>"
    )
  };

  format!(
    r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>glTF conformance report</title>
    <style>
      body {{ font-family: sans-serif; margin: 20px; }}
      table {{ border-collapse: collapse; width: 100%; }}
      th, td {{ border: 1px solid #ddd; padding: 6px; vertical-align: top; }}
      th {{ background: #f3f3f3; position: sticky; top: 0; }}
      tr.fail {{ background: #fff0f0; }}
      .untriaged {{ color: #8a6d00; font-weight: bold; }}
      .clean {{ color: #1b7f2a; }}
      .issue {{ color: #b00020; font-weight: bold; }}
      .missing, .error {{ color: #b00020; }}
      .thumb img {{ width: 640px; display: block; }}
      .absent {{ color: #888; text-decoration: line-through; }}
    </style>
  </head>
  <body>
    <h1>glTF conformance report</h1>
    <p class="meta-time"><strong>Time:</strong> {time}</p>
    <p class="meta-revision"><strong>Revision:</strong> {revision}</p>
    <p class="meta-host"><strong>Host:</strong> {host}</p>
    <p>{reported} of {cases} cases reported ({passed} passed, {failed} failed, {skipped} without results) | {untriaged} untriaged, {clean} without known issues, {known} with known issues.</p>
    <table>
      <thead>
        <tr>
          <th>Label</th>
          <th>Known Issues</th>
          <th>Reference Screenshot</th>
          <th>Captured Screenshot</th>
          <th>Result</th>
          <th>Logs</th>
        </tr>
      </thead>
      <tbody>
{rows}      </tbody>
    </table>{stale}
  </body>
</html>
"#,
    time = escape_html(&report.metadata.generated_at),
    revision = escape_html(report.metadata.revision.as_deref().unwrap_or("unknown")),
    host = escape_html(&report.metadata.host),
    reported = totals.reported,
    cases = totals.cases,
    passed = totals.passed,
    failed = totals.failed,
    skipped = totals.skipped,
    untriaged = totals.untriaged,
    clean = totals.clean,
    known = totals.known_issues,
    rows = rows,
    stale = stale,
  )
}

fn render_row(row: &ReportRow, issue_url_base: &str) -> String {
  let class = if row.outcome.is_failure() { "fail" } else { "pass" };
  let duration = row
    .duration_ms
    .map(|ms| format!("<br>{:.1}s", ms as f64 / 1000.0))
    .unwrap_or_default();
  let status = row.status.as_deref().unwrap_or("-");
  format!(
    "        <tr id=\"{id}\" class=\"{class}\"><td>{label}</td><td>{issues}</td><td>{reference}</td><td>{captured}</td><td>{outcome}<br>exit: {status}{duration}</td><td>{logs}</td></tr>\n",
    id = escape_html(&row.dir),
    label = escape_html(&row.label),
    issues = render_classification(&row.classification, issue_url_base),
    reference = render_image(&row.reference),
    captured = render_image(&row.captured),
    outcome = row.outcome.label(),
    status = escape_html(status),
    logs = render_logs(&row.logs),
  )
}

fn render_classification(classification: &Classification, issue_url_base: &str) -> String {
  match classification {
    Classification::Untriaged => r#"<span class="untriaged">Untriaged</span>"#.to_string(),
    Classification::Clean => r#"<span class="clean">no known issues</span>"#.to_string(),
    Classification::KnownIssues(issues) => issues
      .iter()
      .map(|issue| {
        format!(
          r#"<a class="issue" href="{}">{}</a>"#,
          escape_html(&issue.url(issue_url_base)),
          escape_html(&issue.to_string())
        )
      })
      .collect::<Vec<_>>()
      .join("<br>"),
  }
}

fn render_image(cell: &ImageCell) -> String {
  match cell {
    ImageCell::Available { src } => {
      let src = escape_html(src);
      format!(r#"<div class="thumb"><a href="{src}"><img src="{src}" loading="lazy"></a></div>"#)
    }
    ImageCell::Missing { detail } => {
      format!(r#"<span class="missing">{}</span>"#, escape_html(detail))
    }
    ImageCell::Error { detail } => format!(r#"<span class="error">{}</span>"#, escape_html(detail)),
  }
}

fn render_logs(logs: &[LogLink]) -> String {
  logs
    .iter()
    .map(|log| {
      if log.present {
        format!(r#"<a href="{}">{}</a>"#, escape_html(&log.href), log.name)
      } else {
        format!(r#"<span class="absent">{}</span>"#, log.name)
      }
    })
    .collect::<Vec<_>>()
    .join(" - ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::known_issues::DefectRef;
  use crate::report::{ReportMetadata, ReportTotals};
  use crate::result_store::CaseOutcome;

  fn row(classification: Classification) -> ReportRow {
    ReportRow {
      identity: "Box-glTF".to_string(),
      dir: "Box-glTF".to_string(),
      label: "Box <glTF>".to_string(),
      classification,
      outcome: CaseOutcome::Passed,
      status: Some("0".to_string()),
      duration_ms: Some(1500),
      reference: ImageCell::Available {
        src: "Box-glTF/expected.png".to_string(),
      },
      captured: ImageCell::Error {
        detail: "bad ppm".to_string(),
      },
      logs: vec![
        LogLink {
          name: "ppx.log",
          href: "Box-glTF/ppx.log".to_string(),
          present: false,
        },
        LogLink {
          name: "stdout.log",
          href: "Box-glTF/stdout.log".to_string(),
          present: true,
        },
      ],
    }
  }

  fn report(rows: Vec<ReportRow>) -> Report {
    Report {
      metadata: ReportMetadata {
        generated_at: "t".to_string(),
        revision: None,
        host: "h".to_string(),
      },
      issue_url_base: "https://github.com/google/bigwheels/issues".to_string(),
      totals: ReportTotals::default(),
      rows,
      stale_registry_keys: vec!["Gone-glTF".to_string()],
    }
  }

  #[test]
  fn classifications_are_visually_distinct() {
    let untriaged = render_classification(&Classification::Untriaged, "https://x");
    let clean = render_classification(&Classification::Clean, "https://x");
    let issues = render_classification(
      &Classification::KnownIssues(vec![DefectRef::Number(455), DefectRef::Number(7)]),
      "https://x/issues",
    );
    assert!(untriaged.contains("Untriaged"));
    assert!(clean.contains("no known issues"));
    assert_eq!(
      issues,
      r#"<a class="issue" href="https://x/issues/455">#455</a><br><a class="issue" href="https://x/issues/7">#7</a>"#
    );
    assert_ne!(untriaged, clean);
  }

  #[test]
  fn rows_are_escaped_and_link_logs() {
    let html = render_html(&report(vec![row(Classification::Untriaged)]));
    assert!(html.contains("Box &lt;glTF&gt;"));
    assert!(html.contains(r#"<img src="Box-glTF/expected.png""#));
    assert!(html.contains(r#"<span class="error">bad ppm</span>"#));
    assert!(html.contains(r#"<a href="Box-glTF/stdout.log">stdout.log</a>"#));
    assert!(html.contains(r#"<span class="absent">ppx.log</span>"#));
    assert!(html.contains("exit: 0<br>1.5s"));
    assert!(html.contains("<strong>Revision:</strong> unknown"));
    assert!(html.contains("<li>Gone-glTF</li>"));
  }

  #[test]
  fn escape_html_covers_quotes() {
    assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
  }
}
