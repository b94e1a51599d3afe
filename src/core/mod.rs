// Core library modules
pub mod candidates;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod queue;
pub mod state;

// Re-exports
pub use candidates::{Candidate, CandidateFeed, CandidateSource};
pub use capture::{parse_capture, read_capture};
pub use config::CrackerConfig;
pub use coordinator::{
    write_cracked_result, Coordinator, CrackOutcome, CrackReport, PrecomputeReport, Progress,
};
pub use crypto::{calculate_mic, calculate_pmk, calculate_ptk, MicSuite, Pmk};
pub use engine::CrackEngine;
pub use error::{CrackError, Result};
pub use frame::{Frame, FrameBody, LinkType, MacAddr};
pub use handshake::{load_handshakes, reconstruct, select_handshake, Handshake};
pub use state::{CrackState, Phase};
