use std::fmt::Write;

use serde_json::Value;

use crate::aggregate::ResultSet;
use crate::error::{Result, ShowdownError};
use crate::record::fields::display_scalar;

const HEADER: &str = "ip,score,port,protocol,id,value,summary,severity,references,items";

/// One row per finding, hosts in ranked order. Hosts without findings
/// produce no rows.
pub fn render(results: &ResultSet) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{HEADER}").map_err(|e| ShowdownError::Output(e.to_string()))?;

    for (id, host) in results.sorted() {
        for finding in host.findings() {
            let port = finding.port().map(|p| p.to_string()).unwrap_or_default();
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{}",
                csv_escape(id.as_str()),
                host.score(),
                port,
                csv_escape(finding.protocol().unwrap_or("")),
                csv_escape(&finding.id),
                csv_escape(&value_text(&finding.value)),
                csv_escape(&finding.summary),
                finding.severity,
                csv_escape(&finding.references.join(";")),
                csv_escape(&finding.items.join(";")),
            )
            .map_err(|e| ShowdownError::Output(e.to_string()))?;
        }
    }

    Ok(out)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Array(values) => values.iter().map(display_scalar).collect::<Vec<_>>().join(";"),
        other => display_scalar(other),
    }
}

/// RFC 4180 quoting; cells that a spreadsheet would evaluate as a formula
/// are prefixed with `'`.
fn csv_escape(s: &str) -> String {
    let needs_quoting = s.contains([',', '"', '\n', '\r']);
    let formula = matches!(s.as_bytes().first(), Some(b'=' | b'+' | b'-' | b'@' | b'\t'));

    if formula {
        format!("\"'{}\"", s.replace('"', "\"\""))
    } else if needs_quoting {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
