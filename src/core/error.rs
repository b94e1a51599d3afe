//! Error types for handshake reconstruction and cracking.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cracking operations.
pub type Result<T> = std::result::Result<T, CrackError>;

/// Error type for cracking operations.
#[derive(Error, Debug)]
pub enum CrackError {
    /// An input file (capture, wordlist, PMK table) could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read/write failure after the file was opened.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The capture file is not a readable pcap/pcapng stream.
    #[error("Failed to parse capture: {0}")]
    Capture(String),

    /// The capture uses a link layer we cannot decode 802.11 frames from.
    #[error("Unsupported capture link type {0} (expected 802.11 or radiotap)")]
    UnsupportedLinkType(i32),

    /// The selected handshake lacks fields required for an attack.
    #[error("Handshake is incomplete, missing: {}", missing.join(", "))]
    IncompleteHandshake { missing: Vec<&'static str> },

    /// No SSID was captured or supplied, so passphrases cannot be stretched.
    #[error("SSID unknown for the selected handshake. Please provide --ssid.")]
    MissingSsid,

    /// No handshake matched the selection criteria.
    #[error("Handshake selection failed: {0}")]
    Selection(String),

    /// A PMK table was given as input to PMK precomputation.
    #[error("PMK precomputation needs a wordlist or stream, not a PMK table")]
    InvalidSource,

    /// A handshake JSON file could not be parsed or written.
    #[error("Invalid handshake file: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrackError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CrackError::Open {
            path: path.into(),
            source,
        }
    }
}
