use clair_scanner::approve::Decision;
use clair_scanner::args::Args;
use clair_scanner::docker::DockerSource;
use clair_scanner::errors::*;
use clair_scanner::scan::{self, ScanOptions};
use clair_scanner::whitelist::Whitelist;
use clap::Parser;
use env_logger::Env;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        _ => "debug",
    };
    env_logger::init_from_env(Env::default().default_filter_or(log_level));

    let whitelist = if let Some(path) = &args.whitelist {
        Whitelist::load(path)?
    } else {
        Whitelist::default()
    };

    let opts = ScanOptions {
        image: args.image,
        clair_url: args.clair,
        ip: args.ip,
        port: args.port,
        timeout: args.timeout.map(Duration::from_secs),
    };

    info!("Scanning {:?}", opts.image);
    match scan::run(&opts, &DockerSource, &whitelist).await? {
        Decision::Approved => info!("Image contains no unapproved vulnerabilities"),
        Decision::Rejected(unapproved) => {
            bail!("Image contains unapproved vulnerabilities: {:?}", unapproved);
        }
    }

    Ok(())
}
