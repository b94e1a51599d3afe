/*!
 * Candidate sources
 *
 * A candidate is either a bare passphrase (from a wordlist or a live stream)
 * or a passphrase paired with its precomputed PMK (from a `word:hex` table).
 * Sources are read line by line with surrounding whitespace stripped and
 * blank lines skipped. Passphrases are raw bytes, no encoding is assumed.
 */

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::crypto::Pmk;
use crate::error::{CrackError, Result};
use crate::queue::CandidateSink;
use crate::state::CrackState;

/// One password guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Passphrase(Vec<u8>),
    Precomputed { passphrase: Vec<u8>, pmk: Pmk },
}

impl Candidate {
    pub fn passphrase(&self) -> &[u8] {
        match self {
            Candidate::Passphrase(p) => p,
            Candidate::Precomputed { passphrase, .. } => passphrase,
        }
    }

    pub fn into_passphrase(self) -> Vec<u8> {
        match self {
            Candidate::Passphrase(p) => p,
            Candidate::Precomputed { passphrase, .. } => passphrase,
        }
    }

    /// Passphrase for display, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.passphrase()).into_owned()
    }
}

/// Where candidates come from
pub enum CandidateSource {
    /// Wordlist file, one passphrase per line
    Wordlist(PathBuf),
    /// Unbounded stream (usually stdin), read until EOF or cancellation
    LiveStream(Box<dyn BufRead + Send>),
    /// PMK table, `passphrase:hex_pmk` per line
    Precomputed(PathBuf),
}

impl fmt::Debug for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateSource::Wordlist(path) => f.debug_tuple("Wordlist").field(path).finish(),
            CandidateSource::LiveStream(_) => f.write_str("LiveStream"),
            CandidateSource::Precomputed(path) => {
                f.debug_tuple("Precomputed").field(path).finish()
            }
        }
    }
}

impl CandidateSource {
    /// Live stream over the process's standard input
    pub fn stdin() -> Self {
        CandidateSource::LiveStream(Box::new(BufReader::new(io::stdin())))
    }

    pub fn is_precomputed(&self) -> bool {
        matches!(self, CandidateSource::Precomputed(_))
    }

    /// Open the source. Fails only if a file cannot be opened.
    pub fn open(self) -> Result<CandidateFeed> {
        let (reader, format, bounded) = match self {
            CandidateSource::Wordlist(path) => {
                tracing::info!("Reading wordlist {}", path.display());
                (open_file(&path)?, FeedFormat::Words, true)
            }
            CandidateSource::Precomputed(path) => {
                tracing::info!("Reading PMK table {}", path.display());
                (open_file(&path)?, FeedFormat::PmkTable, true)
            }
            CandidateSource::LiveStream(reader) => {
                tracing::info!("Reading candidates from stream");
                (reader, FeedFormat::Words, false)
            }
        };

        Ok(CandidateFeed {
            reader,
            format,
            bounded,
            line: Vec::new(),
            line_no: 0,
        })
    }
}

fn open_file(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| CrackError::open(path, e))?;
    Ok(Box::new(BufReader::new(file)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedFormat {
    Words,
    PmkTable,
}

/// Opened source, yields candidates in source order
pub struct CandidateFeed {
    reader: Box<dyn BufRead + Send>,
    format: FeedFormat,
    bounded: bool,
    line: Vec<u8>,
    line_no: u64,
}

impl CandidateFeed {
    /// False for live streams, which have no known end
    pub fn is_bounded(&self) -> bool {
        self.bounded
    }
}

impl Iterator for CandidateFeed {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Stopped reading candidates at line {}: {}", self.line_no, e);
                    return None;
                }
            }
            self.line_no += 1;

            let line = self.line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match self.format {
                FeedFormat::Words => return Some(Candidate::Passphrase(line.to_vec())),
                FeedFormat::PmkTable => match parse_pmk_line(line) {
                    Some(candidate) => return Some(candidate),
                    None => {
                        tracing::warn!("Skipping malformed PMK table line {}", self.line_no);
                    }
                },
            }
        }
    }
}

/// Parse one `passphrase:hex_pmk` line
///
/// The split is at the last ':' so passphrases may contain colons.
pub fn parse_pmk_line(line: &[u8]) -> Option<Candidate> {
    let split = line.iter().rposition(|&b| b == b':')?;
    let passphrase = line[..split].trim_ascii();
    let pmk_hex = line[split + 1..].trim_ascii();

    let bytes = hex::decode(pmk_hex).ok()?;
    let pmk: Pmk = bytes.try_into().ok()?;
    Some(Candidate::Precomputed {
        passphrase: passphrase.to_vec(),
        pmk,
    })
}

/// Format one PMK table line, newline included
pub fn format_pmk_line(passphrase: &[u8], pmk: &Pmk) -> Vec<u8> {
    let mut line = Vec::with_capacity(passphrase.len() + 66);
    line.extend_from_slice(passphrase);
    line.push(b':');
    line.extend_from_slice(hex::encode(pmk).as_bytes());
    line.push(b'\n');
    line
}

/// Push every candidate of `feed` into the queue
///
/// Stops at end of input, on cancellation, or when all workers are gone.
/// Dropping the sink on return tells the workers the producer is finished.
pub fn run_producer(feed: CandidateFeed, sink: CandidateSink, state: &CrackState) -> u64 {
    let mut loaded = 0u64;
    for candidate in feed {
        if state.is_cancelled() {
            break;
        }
        if !sink.push(candidate) {
            break;
        }
        loaded += 1;
    }
    tracing::debug!("Producer finished after {} candidates", loaded);
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, Dequeue};
    use std::io::{Cursor, Write};
    use std::time::Duration;

    fn stream(data: &[u8]) -> CandidateSource {
        CandidateSource::LiveStream(Box::new(Cursor::new(data.to_vec())))
    }

    #[test]
    fn test_wordlist_trims_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"alpha\r\n\n   \n  beta  \ngamma").unwrap();

        let feed = CandidateSource::Wordlist(file.path().to_path_buf())
            .open()
            .unwrap();
        assert!(feed.is_bounded());
        let words: Vec<Vec<u8>> = feed.map(Candidate::into_passphrase).collect();
        assert_eq!(words, vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);
    }

    #[test]
    fn test_non_utf8_passphrase_kept_verbatim() {
        let feed = stream(b"caf\xe9\n").open().unwrap();
        assert!(!feed.is_bounded());
        let words: Vec<Candidate> = feed.collect();
        assert_eq!(words, vec![Candidate::Passphrase(b"caf\xe9".to_vec())]);
        assert_eq!(words[0].text(), "caf\u{fffd}");
    }

    #[test]
    fn test_missing_wordlist() {
        let err = CandidateSource::Wordlist(PathBuf::from("/nonexistent/words.txt"))
            .open()
            .err()
            .unwrap();
        assert!(matches!(err, CrackError::Open { .. }));
    }

    #[test]
    fn test_parse_pmk_line() {
        let pmk = [0xABu8; 32];
        let line = format_pmk_line(b"pass:word", &pmk);
        assert_eq!(line.len(), 9 + 1 + 64 + 1);

        let candidate = parse_pmk_line(line.trim_ascii()).unwrap();
        assert_eq!(
            candidate,
            Candidate::Precomputed {
                passphrase: b"pass:word".to_vec(),
                pmk,
            }
        );

        assert!(parse_pmk_line(b"no separator").is_none());
        assert!(parse_pmk_line(b"word:abcd").is_none());
        assert!(parse_pmk_line(b"word:zz").is_none());
    }

    #[test]
    fn test_pmk_table_drops_malformed_lines() {
        let good = format_pmk_line(b"secret", &[1u8; 32]);
        let mut table = b"broken line\n".to_vec();
        table.extend_from_slice(&good);
        table.extend_from_slice(b"short:0102\n");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&table).unwrap();

        let feed = CandidateSource::Precomputed(file.path().to_path_buf())
            .open()
            .unwrap();
        let candidates: Vec<Candidate> = feed.collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].passphrase(), b"secret");
    }

    #[test]
    fn test_producer_feeds_queue_and_closes() {
        let (sink, queue) = queue::bounded(8);
        let state = CrackState::new();
        let feed = stream(b"one\ntwo\nthree\n").open().unwrap();

        assert_eq!(run_producer(feed, sink, &state), 3);

        let mut got = Vec::new();
        loop {
            match queue.pop(Duration::from_millis(50)) {
                Dequeue::Candidate(c) => got.push(c.text()),
                Dequeue::TimedOut => continue,
                Dequeue::Closed => break,
            }
        }
        assert_eq!(got, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_producer_stops_on_cancel() {
        let (sink, _queue) = queue::bounded(8);
        let state = CrackState::new();
        state.cancel();
        let feed = stream(b"one\ntwo\n").open().unwrap();
        assert_eq!(run_producer(feed, sink, &state), 0);
    }
}
