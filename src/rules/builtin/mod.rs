mod cloud;
mod db;
mod eol;
mod files;
mod http;
mod info;
mod ssh;
mod ssl;
mod vulns;

use std::sync::Arc;

use super::Detector;

type Constructor = fn() -> Arc<dyn Detector>;

/// Built-in rules by registry name, in catalogue order.
const BUILTIN: &[(&str, Constructor)] = &[
    ("info", || Arc::new(info::InfoDetector)),
    ("vulns", || Arc::new(vulns::VulnsDetector)),
    ("ssl", || Arc::new(ssl::SslDetector)),
    ("db", || Arc::new(db::DatabaseDetector)),
    ("files", || Arc::new(files::FileShareDetector)),
    ("eol", || Arc::new(eol::EolDetector)),
    ("ssh", || Arc::new(ssh::SshDetector)),
    ("http", || Arc::new(http::HttpDetector)),
    ("cloud", || Arc::new(cloud::CloudDetector)),
];

/// Rules used when neither the CLI nor the config selects any.
pub const DEFAULT_RULES: &[&str] = &["info", "vulns"];

/// Instantiate every built-in detector.
pub fn all_detectors() -> Vec<Arc<dyn Detector>> {
    BUILTIN.iter().map(|(_, build)| build()).collect()
}
