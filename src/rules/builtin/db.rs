use crate::record::fields::{array_at, bool_at, display_scalar, is_truthy, str_at, strings_at};
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

/// Databases reachable without authentication.
const NO_AUTH: Points = Points::new(200);

/// Exposed database engines and what they enumerate.
///
/// Exposure itself is informational; only unauthenticated access scores.
pub struct DatabaseDetector;

impl Detector for DatabaseDetector {
    fn name(&self) -> &'static str {
        "db"
    }

    fn summary(&self) -> &'static str {
        "Details of DBs found like MongoDB, Redis etc..."
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        for probe in &host.data {
            check_cassandra(probe, sink);
            check_couchdb(probe, sink);
            check_db2(probe, sink);
            check_influxdb(probe, sink);
            check_mongodb(probe, sink);
            check_redis(probe, sink);
            check_cockroachdb(probe, sink);
        }
        Ok(())
    }
}

fn exposed(probe: &ServiceProbe, id: &str, value: &str, summary: String) -> Finding {
    Finding::new(id, value, summary, Severity::Info).at(probe.endpoint())
}

fn listing(probe: &ServiceProbe, id: &str, value: &str, summary: &str, items: Vec<String>) -> Finding {
    Finding::new(id, value, summary, Severity::Info)
        .at(probe.endpoint())
        .with_items(items)
}

fn owned<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items.map(str::to_string).collect()
}

fn check_cassandra(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("cassandra") else { return };
    let name = str_at(doc, "name").unwrap_or("Cassandra");
    let version = str_at(doc, "version").unwrap_or("unknown");
    sink.add_finding(exposed(probe, "cassandra_exposed", name, format!("{name} ({version})")));

    let keyspaces = owned(strings_at(doc, "keyspaces"));
    if !keyspaces.is_empty() {
        sink.add_finding(listing(probe, "cassandra_keyspaces", name, "Cassandra keyspaces", keyspaces));
    }
}

fn check_couchdb(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("couchdb") else { return };
    let Some(banner) = str_at(doc, "couchdb") else { return };
    let version = str_at(doc, "version").unwrap_or("unknown");
    sink.add_finding(exposed(
        probe,
        "couchdb_exposed",
        banner,
        format!("Couch DB exposed: {banner} ({version})"),
    ));

    let dbs = owned(strings_at(doc, "dbs"));
    if !dbs.is_empty() {
        sink.add_finding(listing(probe, "couchdb_databases", banner, "Couchdb Databases", dbs));
    }
}

fn check_db2(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("ibm_db2") else { return };
    let instance = str_at(doc, "instance_name").unwrap_or("unknown");
    let version = str_at(doc, "db2_version").unwrap_or("unknown");
    sink.add_finding(exposed(
        probe,
        "DB2_exposed",
        instance,
        format!("DB2 DB exposed: {instance} ({version})"),
    ));
}

fn check_influxdb(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("influxdb") else { return };
    let version = str_at(doc, "version").unwrap_or("unknown");
    sink.add_finding(exposed(
        probe,
        "influxdb_exposed",
        "InfluxDB",
        format!("Influx DB exposed: {version}"),
    ));

    let databases = owned(strings_at(doc, "databases"));
    if !databases.is_empty() {
        sink.add_finding(listing(probe, "influxdb_databases", "InfluxDB", "Influxdb Databases", databases));
    }
}

fn check_mongodb(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("mongodb") else { return };
    let version = doc
        .get("serverStatus")
        .and_then(|s| str_at(s, "version"))
        .unwrap_or("");
    sink.add_finding(exposed(
        probe,
        "mongodb_exposed",
        "MongoDB",
        format!("MongoDB DB exposed ({version})"),
    ));

    if let Some(list) = doc.get("listDatabases") {
        let dbs: Vec<String> = array_at(list, "databases")
            .iter()
            .filter_map(|db| str_at(db, "name"))
            .map(str::to_string)
            .collect();
        if !dbs.is_empty() {
            sink.add_finding(listing(probe, "mongodb_databases", "MongoDB", "MongoDB Databases", dbs));
        }
    }

    // Only an explicit `false` means no auth; a missing flag is unknown.
    if bool_at(doc, "authentication") == Some(false) {
        sink.record(
            Finding::new("mongodb_no_auth", true, "MongoDB With No Auth", Severity::High)
                .at(probe.endpoint()),
            NO_AUTH,
        );
    }
}

fn check_redis(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("redis") else { return };
    if let Some(server) = doc.get("server").filter(|s| s.is_object()) {
        let version = str_at(server, "redis_version").unwrap_or("");
        sink.add_finding(exposed(probe, "redis_exposed", "Redis", format!("Redis DB exposed ({version})")));
    }

    let keys: Vec<String> = doc
        .get("keys")
        .map(|k| array_at(k, "data"))
        .unwrap_or(&[])
        .iter()
        .map(display_scalar)
        .collect();
    if !keys.is_empty() {
        sink.add_finding(listing(probe, "redis_keys", "Redis", "Redis keys", keys));
    }
}

fn check_cockroachdb(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(doc) = probe.module("cockroachdb") else { return };
    let version = str_at(doc, "version").unwrap_or("unknown");
    sink.add_finding(exposed(
        probe,
        "cockroachdb_exposed",
        "Cockroachdb",
        format!("Cockroach DB exposed ({version})"),
    ));

    if is_truthy(doc.get("experimental_user_login")) {
        sink.record(
            Finding::new("cockroachdb_no_auth", true, "Cockroachdb With No Auth", Severity::High)
                .at(probe.endpoint()),
            NO_AUTH,
        );
    }
}
