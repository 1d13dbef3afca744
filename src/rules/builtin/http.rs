use crate::record::fields::str_at;
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

/// Credential-looking words that should not appear in a public page.
/// Matched case-insensitively as substrings of the page body.
const HTML_KEYWORDS: &[&str] = &[
    "ConsumerKey",
    "ConsumerSecret",
    "DB_USERNAME",
    "HEROKU_API_KEY",
    "HOMEBREW_GITHUB_API_TOKEN",
    "JEKYLL_GITHUB_TOKEN",
    "PT_TOKEN",
    "SESSION_TOKEN",
    "SF_USERNAME",
    "SLACK_BOT_TOKEN",
    "access-token",
    "access_token",
    "access_token_secret",
    "accesstoken",
    "admin",
    "api-key",
    "api_key",
    "api_secret_key",
    "api_token",
    "auth_token",
    "authkey",
    "authorization",
    "authorization_key",
    "authorization_token",
    "authtoken",
    "aws_access_key_id",
    "aws_secret_access_key",
    "bearer",
    "bot_access_token",
    "bucket",
    "client-secret",
    "client_id",
    "client_key",
    "client_secret",
    "clientsecret",
    "consumer_key",
    "consumer_secret",
    "dbpasswd",
    "email",
    "encryption-key",
    "encryption_key",
    "encryptionkey",
    "id_dsa",
    "irc_pass",
    "key",
    "oauth_token",
    "pass",
    "password",
    "private_key",
    "private-key",
    "privatekey",
    "secret",
    "secret-key",
    "secret_key",
    "secret_token",
    "secretkey",
    "session_key",
    "session_secret",
    "slack_api_token",
    "slack_secret_token",
    "slack_token",
    "ssh-key",
    "ssh_key",
    "sshkey",
    "token",
    "username",
    "xoxa-2",
    "xoxr",
];

const DISALLOW: &str = "Disallow:";

/// robots.txt disallows, credential keywords and directory listings.
pub struct HttpDetector;

impl Detector for HttpDetector {
    fn name(&self) -> &'static str {
        "http"
    }

    fn summary(&self) -> &'static str {
        "Checks HTTP services to try and discover interesting findings such as robots.txt entries, keywords in HTML etc..."
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        for probe in host.probes_with("http") {
            let Some(http) = probe.module("http") else { continue };

            if let Some(robots) = str_at(http, "robots") {
                check_robots(probe, robots, sink);
            }
            if let Some(html) = str_at(http, "html") {
                check_keywords(probe, html, sink);
            }
            if let Some(title) = str_at(http, "title") {
                if title.to_lowercase().contains("index of") {
                    sink.record(
                        Finding::new(
                            "http_dir_listing",
                            title,
                            format!("Found directory listing: {title}"),
                            Severity::High,
                        )
                        .at(probe.endpoint()),
                        Points::new(200),
                    );
                }
            }
        }
        Ok(())
    }
}

fn check_robots(probe: &ServiceProbe, robots: &str, sink: &mut OutputHost) {
    let disallowed: Vec<String> = robots
        .lines()
        .filter(|line| line.contains(DISALLOW))
        .map(|line| line.replace(DISALLOW, "").trim().to_string())
        .collect();
    if disallowed.is_empty() {
        return;
    }
    sink.record(
        Finding::new("robots_txt", robots, "Disallows in robots.txt:", Severity::Low)
            .at(probe.endpoint())
            .with_items(disallowed),
        Points::new(50),
    );
}

fn check_keywords(probe: &ServiceProbe, html: &str, sink: &mut OutputHost) {
    let body = html.to_lowercase();
    for keyword in HTML_KEYWORDS {
        if body.contains(&keyword.to_lowercase()) {
            sink.record(
                Finding::new(
                    format!("html_keyword_{keyword}"),
                    *keyword,
                    format!("Found keyword in HTML: {keyword}"),
                    Severity::High,
                )
                .at(probe.endpoint()),
                Points::new(200),
            );
        }
    }
}
