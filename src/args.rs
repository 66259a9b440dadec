use crate::scan;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Scan local container images for vulnerabilities with Clair")]
pub struct Args {
    /// Name of the container image to scan
    pub image: String,
    /// Path to the whitelist file
    #[arg(short, long, value_name = "PATH")]
    pub whitelist: Option<PathBuf>,
    /// Url of the Clair server
    #[arg(short, long, default_value = "http://127.0.0.1:6060", value_name = "URL")]
    pub clair: String,
    /// Ip address Clair can reach this host on to pull layers
    #[arg(long, default_value = "localhost", value_name = "ADDR")]
    pub ip: String,
    /// Port the layer server listens on
    #[arg(short, long, default_value_t = scan::DEFAULT_PORT)]
    pub port: u16,
    /// Timeout in seconds for requests to the Clair server
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
    /// Turn debugging information on
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
}
