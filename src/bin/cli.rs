use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use showdown::config::{Config, CONFIG_FILE};
use showdown::error::{Result, ShowdownError};
use showdown::output::OutputFormat;
use showdown::record::HostIdentifier;
use showdown::retrieval::FetchEvent;
use showdown::rules::RuleRegistry;
use showdown::source::{HostSource, RecordDirectory};
use showdown::{targets, Outcome, TriageOptions, TriageReport};

#[derive(Parser)]
#[command(
    name = "showdown",
    about = "Pull back juicy info on external targets from Shodan",
    version,
    author
)]
struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve host records, run rules and rank hosts by score
    Scan(ScanArgs),

    /// List all available rules
    ListRules {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .showdown.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Hosts file, one IP address, CIDR network or hostname per line
    #[arg(long, short = 'f')]
    file: Option<PathBuf>,

    /// Network range to search using CIDR notation (13.77.161.0/22)
    #[arg(long, short = 'n')]
    network: Option<String>,

    /// File containing the Shodan API key
    #[arg(long, short = 'k')]
    key_file: Option<PathBuf>,

    /// Shodan API key
    #[arg(long, env = "SHODAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Read previously downloaded `<ip>.json` records instead of calling Shodan
    #[arg(long)]
    records: Option<PathBuf>,

    /// Rules to run as a comma separated list (see `list-rules`)
    #[arg(long, short = 'r', value_delimiter = ',')]
    rules: Vec<String>,

    /// Maximum simultaneous lookups
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Minimum delay between starting consecutive lookups, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Output format (console, csv, json)
    #[arg(long)]
    format: Option<String>,

    /// Write output to file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Disable coloured console output
    #[arg(long)]
    no_color: bool,

    /// Config file path
    #[arg(long, short = 'c', default_value = CONFIG_FILE)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Scan(args) => cmd_scan(args),
        Commands::ListRules { format } => cmd_list_rules(&format),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "[!]".red().bold(), e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    // CLI flags override the config file.
    if !args.rules.is_empty() {
        config.rules.enabled = args.rules.clone();
    }
    if let Some(threads) = args.threads {
        config.retrieval.concurrency = threads;
    }
    if let Some(delay) = args.delay_ms {
        config.retrieval.min_interval_ms = delay;
    }
    if let Some(format) = &args.format {
        config.output.format = OutputFormat::from_str_lenient(format)
            .ok_or_else(|| ShowdownError::Config(format!("unknown output format '{format}'")))?;
    }
    if args.no_color {
        config.output.color = false;
    }
    config.validate()?;

    // Unknown rule names are rejected before any lookup is made.
    RuleRegistry::builtin().resolve(&config.rules.enabled)?;

    let options = TriageOptions::from_config(&config);
    let report = match &args.records {
        Some(dir) => {
            let source = RecordDirectory::open(dir)?;
            let mut ids = collect_targets(&args)?;
            if ids.is_empty() {
                ids = source.identifiers();
            }
            run(&source, ids, &options)?
        }
        None => {
            let ids = collect_targets(&args)?;
            if ids.is_empty() {
                return Err(ShowdownError::Config(
                    "must provide either a file or network to search against, see usage with -h".into(),
                ));
            }
            let source = live_source(&args)?;
            run(&source, ids, &options)?
        }
    };

    // Files never get escape codes.
    let color = config.output.color && args.output.is_none();
    let rendered = showdown::render_report(&report, config.output.format, color)?;
    match &args.output {
        Some(path) => std::fs::write(path, &rendered)?,
        None => print!("{rendered}"),
    }

    match report.outcome() {
        Outcome::NoHostsRetrieved => eprintln!(
            "{} No hosts retrieved ({} requested).",
            "[!]".yellow(),
            report.requested
        ),
        Outcome::NoFindings { hosts } => {
            eprintln!("{} {hosts} host(s) retrieved, zero findings.", "[*]".green())
        }
        Outcome::Findings { hosts, findings } => {
            eprintln!("{} {findings} finding(s) across {hosts} host(s).", "[*]".green())
        }
    }
    Ok(())
}

fn run<S: HostSource>(source: &S, ids: BTreeSet<HostIdentifier>, options: &TriageOptions) -> Result<TriageReport> {
    let total = ids.len();
    eprintln!(
        "{} Using rules: {}",
        "[*]".yellow(),
        options.rules.join(",")
    );
    eprintln!(
        "{} Looking up {total} host(s), {} at a time, one every {:?}",
        "[*]".yellow(),
        options.concurrency,
        options.min_interval
    );

    let mut done = 0usize;
    showdown::triage(source, ids, options, move |event: &FetchEvent| {
        done += 1;
        match event {
            FetchEvent::Retrieved(id) => eprintln!("{} [{done}/{total}] {id}", "[+]".green()),
            FetchEvent::Failed { id, reason } => {
                eprintln!("{} [{done}/{total}] {id}: {reason}", "[-]".red())
            }
        }
    })
}

fn collect_targets(args: &ScanArgs) -> Result<BTreeSet<HostIdentifier>> {
    let mut ids = BTreeSet::new();
    if let Some(file) = &args.file {
        ids.extend(targets::read_targets_file(file)?);
    }
    if let Some(network) = &args.network {
        ids.extend(targets::expand_network(network)?);
    }
    Ok(ids)
}

fn read_key(args: &ScanArgs) -> Result<String> {
    if let Some(path) = &args.key_file {
        let key = std::fs::read_to_string(path)?.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    args.api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ShowdownError::Config("no Shodan API key, use --key-file or set SHODAN_API_KEY".into()))
}

#[cfg(feature = "shodan")]
fn live_source(args: &ScanArgs) -> Result<Box<dyn HostSource>> {
    let client = showdown::source::ShodanClient::new(read_key(args)?)?;
    let info = client.api_info()?;
    eprintln!("{} Successful Shodan call.", "[*]".green());
    eprintln!("{} Plan: {} ({} query credits)", "[*]".yellow(), info.plan, info.query_credits);
    Ok(Box::new(client))
}

#[cfg(not(feature = "shodan"))]
fn live_source(args: &ScanArgs) -> Result<Box<dyn HostSource>> {
    read_key(args)?;
    Err(ShowdownError::Config(
        "built without the `shodan` feature, use --records DIR".into(),
    ))
}

fn cmd_list_rules(format: &str) -> Result<()> {
    let rules = RuleRegistry::builtin().list();

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&rules)?;
            println!("{json}");
        }
        _ => {
            println!("{:<8} SUMMARY", "NAME");
            println!("{}", "-".repeat(80));
            for rule in &rules {
                println!("{:<8} {}", rule.name, rule.summary);
            }
        }
    }

    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() && !force {
        return Err(ShowdownError::Config(format!(
            "{CONFIG_FILE} already exists, use --force to overwrite"
        )));
    }

    std::fs::write(path, Config::starter_toml())?;
    println!("Created {CONFIG_FILE}");

    Ok(())
}
