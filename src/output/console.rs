use colored::{ColoredString, Colorize};

use crate::aggregate::ResultSet;
use crate::record::HostIdentifier;
use crate::rules::{Finding, OutputHost, Severity};

const RULE_WIDTH: usize = 100;

/// Render ranked hosts for a terminal, highest score first.
pub fn render(results: &ResultSet, color: bool) -> String {
    let mut output = String::new();

    if color {
        output.push_str("[+] Key: ");
        for severity in Severity::DESCENDING {
            output.push_str(&paint(by_severity(severity.label(), severity), color));
            output.push(' ');
        }
        output.push('\n');
    }

    for (id, host) in results.sorted() {
        render_host(&mut output, id, host, color);
    }

    output
}

fn render_host(output: &mut String, id: &HostIdentifier, host: &OutputHost, color: bool) {
    let rule = "=".repeat(RULE_WIDTH);
    let banner = format!(
        "Host: {id} Score: {} - https://www.shodan.io/host/{id}",
        host.score()
    );
    for line in [&rule, &banner, &rule] {
        output.push_str(&paint(line.magenta(), color));
        output.push('\n');
    }

    for finding in host.findings() {
        render_finding(output, finding, color);
    }

    for failure in host.failures() {
        let line = format!("[!] rule '{}' failed: {}", failure.rule, failure.message);
        output.push_str(&paint(line.red().bold(), color));
        output.push('\n');
    }
}

fn render_finding(output: &mut String, finding: &Finding, color: bool) {
    let headline = match finding.endpoint() {
        Some(endpoint) => format!("[{endpoint}] => {}", finding.summary),
        None => format!("[+] {}", finding.summary),
    };
    output.push_str(&paint(by_severity(&headline, finding.severity), color));
    output.push('\n');

    for item in &finding.items {
        output.push_str(&paint(format!("\t[+] {item}").cyan(), color));
        output.push('\n');
    }
    for reference in &finding.references {
        output.push_str(&paint(format!("\t[+] {reference}").blue(), color));
        output.push('\n');
    }
}

fn by_severity(text: &str, severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => text.white().on_red(),
        Severity::High => text.red(),
        Severity::Medium => text.yellow(),
        Severity::Low => text.green(),
        Severity::Info => text.cyan(),
    }
}

fn paint(text: ColoredString, color: bool) -> String {
    if color {
        text.to_string()
    } else {
        text.clear().to_string()
    }
}
