use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::io::{self, BufRead};
use std::process;
use subhive::config;
use subhive::output::OutputManager;
use subhive::resolver::Resolver;
use subhive::sources;
use subhive::targets;
use subhive::types::{Config, SourceGroup};
use subhive::{Args, Scanner};

const BANNER: &str = r#"
           _     _     _
 ___ _   _| |__ | |__ (_)_   _____
/ __| | | | '_ \| '_ \| \ \ / / _ \
\__ \ |_| | |_) | | | | |\ V /  __/
|___/\__,_|_.__/|_| |_|_| \_/ \___|

   Concurrent Subdomain Enumeration
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.silent {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if !args.silent {
        eprintln!("{}", BANNER);
    }

    let mut config = match args.config_path.as_deref() {
        Some(path) => config::load_config(path).context("Failed to load configuration")?,
        None => {
            let mut config = Config::default();
            config::apply_env_overrides(&mut config);
            config
        }
    };
    args.apply(&mut config);
    config::validate_config(&config).context("Invalid configuration")?;

    if args.list_sources {
        list_sources(&config);
        return Ok(());
    }

    let raw_targets = get_targets_from_args(&args);
    let targets = targets::canonicalize_all(&raw_targets);
    if targets.is_empty() {
        error!("No input provided. Use -t <target>, -f <file>, or pipe targets to stdin");
        process::exit(1);
    }

    check_targets(&config, &targets).await;

    let progress = !config.output.silent && atty::is(atty::Stream::Stderr);
    let scanner = Scanner::new(config.clone())
        .context("Failed to set up scanner")?
        .with_progress(progress);
    let output = OutputManager::new(config.output.clone());

    let stats = scanner
        .run(&targets, &output)
        .await
        .context("Enumeration failed")?;

    info!(
        "Enumeration completed: {} subdomains and {} unique IPs across {} targets in {:.2}s ({} source failures)",
        stats.unique_subdomains,
        stats.unique_ips,
        stats.targets,
        stats.duration.as_secs_f64(),
        stats.failed_sources
    );
    if stats.output_failures > 0 {
        error!("{} reports could not be written", stats.output_failures);
    }

    Ok(())
}

fn list_sources(config: &Config) {
    println!("Available sources:\n");

    for (group, title) in [
        (SourceGroup::Core, "Core sources (always run)"),
        (SourceGroup::Premium, "Premium sources (--additional-info)"),
        (SourceGroup::Scan, "Scan sources (--with-nmap)"),
    ] {
        println!("{}", title);
        for source in sources::get_all_sources(config) {
            let info = source.info();
            if info.group != group {
                continue;
            }
            let marker = if info.needs_key { " *" } else { "" };
            let scope = if info.scoped { "" } else { " (unscoped)" };
            println!("  {}{}{}", info.name, marker, scope);
        }
        println!();
    }

    println!("* = Requires credentials (CENSYS_ID/CENSYS_SECRET, SHODAN_API_KEY)");
}

fn get_targets_from_args(args: &Args) -> Vec<String> {
    let mut raw = args.target.clone();

    if let Some(path) = &args.file {
        match targets::load_target_file(path) {
            Ok(lines) => raw.extend(lines),
            Err(e) => error!("Failed to read targets from file {:?}: {}", path, e),
        }
    }

    if args.use_stdin() {
        let stdin = io::stdin();
        for line in stdin.lock().lines().map_while(|line| line.ok()) {
            raw.extend(targets::parse_target_list(&line));
        }
    }

    raw
}

/// Resolvability is informational only; scanning proceeds regardless.
async fn check_targets(config: &Config, targets: &[String]) {
    match Resolver::new(&config.resolver) {
        Ok(resolver) => {
            for target in targets {
                resolver.check_target(target).await;
            }
        }
        Err(e) => error!("Could not build resolver for target checks: {}", e),
    }
}
