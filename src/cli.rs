use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

use halfwpa::CandidateSource;

#[derive(Parser, Debug)]
#[command(name = "halfwpa")]
#[command(version)]
#[command(about = "WPA/WPA2 half-handshake dictionary cracker - Educational use only", long_about = None)]
#[command(group(ArgGroup::new("source").args(["wordlist", "pmk", "stdin"]).multiple(false)))]
pub struct Args {
    /// Capture file (.cap/.pcap/.pcapng) or exported handshake (.json)
    ///
    /// Only messages 1 and 2 of the 4-way handshake are needed.
    #[arg(short, long, value_name = "FILE", required_unless_present = "gen_pmk")]
    pub capture: Option<PathBuf>,

    /// Network SSID (overrides the SSID seen in beacons)
    #[arg(short, long)]
    pub ssid: Option<String>,

    /// Wordlist file, one passphrase per line
    #[arg(short, long, value_name = "FILE")]
    pub wordlist: Option<PathBuf>,

    /// Precomputed PMK table (`passphrase:hex_pmk` lines) from --gen-pmk
    #[arg(short, long, value_name = "FILE")]
    pub pmk: Option<PathBuf>,

    /// Read passphrases from stdin so generators can pipe into the cracker
    #[arg(long)]
    pub stdin: bool,

    /// Precompute PMKs for --ssid into `<ssid>.pmks` instead of cracking
    ///
    /// Example: halfwpa --gen-pmk --ssid MyNetwork -w rockyou.txt
    #[arg(long, requires = "ssid", conflicts_with_all = ["capture", "pmk", "id", "export"])]
    pub gen_pmk: bool,

    /// Handshake to attack, by ID from the listing
    #[arg(long)]
    pub id: Option<usize>,

    /// Number of worker threads (default: CPU count)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Directory for `.cracked` and `.pmks` files (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Save the selected handshake as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Candidate source selected on the command line
    pub fn source(&self) -> Option<CandidateSource> {
        if self.stdin {
            Some(CandidateSource::stdin())
        } else if let Some(table) = &self.pmk {
            Some(CandidateSource::Precomputed(table.clone()))
        } else {
            self.wordlist.clone().map(CandidateSource::Wordlist)
        }
    }
}
