/*!
 * Candidate verification against one handshake
 *
 * The PRF context (MACs and nonces in canonical order) is fixed per
 * handshake, so it is built once. Each test then costs one PBKDF2 run
 * (skipped for precomputed candidates), one PRF-512 and one MIC.
 */

use crate::candidates::Candidate;
use crate::crypto::{
    calculate_mic, calculate_pmk, constant_time_compare_16, expand_key, kck, pke_context,
    MicSuite, Pmk, PKE_CONTEXT_LEN, PTK_LABEL,
};
use crate::error::{CrackError, Result};
use crate::handshake::Handshake;

/// Immutable per-handshake verification data, shared by all workers
#[derive(Debug, Clone)]
pub struct CrackEngine {
    ssid: Vec<u8>,
    context: [u8; PKE_CONTEXT_LEN],
    data: Vec<u8>,
    mic: [u8; 16],
    suite: MicSuite,
}

impl CrackEngine {
    /// Prepare a complete handshake with a known SSID for attack
    pub fn new(handshake: &Handshake) -> Result<Self> {
        let (Some(ap), Some(client), Some(anonce), Some(snonce), Some(mic), Some(data)) = (
            handshake.ap_mac,
            handshake.client_mac,
            handshake.anonce,
            handshake.snonce,
            handshake.mic,
            handshake.data.as_ref(),
        ) else {
            return Err(CrackError::IncompleteHandshake {
                missing: handshake.missing_fields(),
            });
        };
        let ssid = handshake.ssid.clone().ok_or(CrackError::MissingSsid)?;

        let suite = MicSuite::from_eapol(data);
        tracing::debug!(
            "Prepared handshake {} -> {} ({:?} MIC)",
            client,
            ap,
            suite
        );

        Ok(Self {
            ssid,
            context: pke_context(ap.octets(), client.octets(), &anonce, &snonce),
            data: data.clone(),
            mic,
            suite,
        })
    }

    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }

    pub fn suite(&self) -> MicSuite {
        self.suite
    }

    /// Check a PMK by recomputing the MIC over the captured frame
    pub fn test_pmk(&self, pmk: &Pmk) -> bool {
        let ptk = expand_key(pmk, PTK_LABEL, &self.context);
        let mic = calculate_mic(&kck(&ptk), &self.data, self.suite);
        constant_time_compare_16(&mic, &self.mic)
    }

    /// Check a candidate, deriving its PMK unless precomputed
    pub fn test(&self, candidate: &Candidate) -> bool {
        match candidate {
            Candidate::Passphrase(passphrase) => {
                self.test_pmk(&calculate_pmk(passphrase, &self.ssid))
            }
            Candidate::Precomputed { pmk, .. } => self.test_pmk(pmk),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::calculate_ptk;
    use crate::frame::tests::{eapol_key, AP, CLIENT};
    use crate::frame::MIC_OFFSET;

    /// Handshake whose MIC was produced with `passphrase`
    pub(crate) fn handshake_for(passphrase: &[u8], ssid: &[u8], key_info: u16) -> Handshake {
        let ap = AP;
        let client = CLIENT;
        let anonce = [0x02; 32];
        let snonce = [0x01; 32];
        let data = eapol_key(key_info, snonce, [0; 16]);

        let pmk = calculate_pmk(passphrase, ssid);
        let ptk = calculate_ptk(&pmk, ap.octets(), client.octets(), &anonce, &snonce);
        let mic = calculate_mic(&kck(&ptk), &data, MicSuite::from_eapol(&data));
        assert_eq!(&data[MIC_OFFSET..MIC_OFFSET + 16], &[0u8; 16]);

        Handshake {
            ap_mac: Some(ap),
            client_mac: Some(client),
            anonce: Some(anonce),
            snonce: Some(snonce),
            mic: Some(mic),
            data: Some(data),
            ssid: Some(ssid.to_vec()),
        }
    }

    #[test]
    fn test_correct_passphrase_matches() {
        let engine = CrackEngine::new(&handshake_for(b"correct123", b"TestNet", 0x010a)).unwrap();
        assert_eq!(engine.suite(), MicSuite::Aes);
        assert_eq!(engine.ssid(), b"TestNet");

        assert!(engine.test(&Candidate::Passphrase(b"correct123".to_vec())));
        assert!(!engine.test(&Candidate::Passphrase(b"wrongpass".to_vec())));
        assert!(!engine.test(&Candidate::Passphrase(b"hunter2".to_vec())));
    }

    #[test]
    fn test_legacy_suite_matches() {
        let engine = CrackEngine::new(&handshake_for(b"correct123", b"TestNet", 0x0109)).unwrap();
        assert_eq!(engine.suite(), MicSuite::Legacy);
        assert!(engine.test(&Candidate::Passphrase(b"correct123".to_vec())));
    }

    #[test]
    fn test_precomputed_candidate_uses_pmk() {
        let engine = CrackEngine::new(&handshake_for(b"correct123", b"TestNet", 0x010a)).unwrap();
        let pmk = calculate_pmk(b"correct123", b"TestNet");

        // The PMK decides, the passphrase is only carried along
        assert!(engine.test(&Candidate::Precomputed {
            passphrase: b"label only".to_vec(),
            pmk,
        }));
        assert!(!engine.test(&Candidate::Precomputed {
            passphrase: b"correct123".to_vec(),
            pmk: [0u8; 32],
        }));
    }

    #[test]
    fn test_ssid_is_the_salt() {
        let mut handshake = handshake_for(b"correct123", b"TestNet", 0x010a);
        handshake.ssid = Some(b"OtherNet".to_vec());
        let engine = CrackEngine::new(&handshake).unwrap();
        assert!(!engine.test(&Candidate::Passphrase(b"correct123".to_vec())));
    }

    #[test]
    fn test_incomplete_handshake_rejected() {
        let mut handshake = handshake_for(b"correct123", b"TestNet", 0x010a);
        handshake.snonce = None;
        handshake.mic = None;
        match CrackEngine::new(&handshake) {
            Err(CrackError::IncompleteHandshake { missing }) => {
                assert_eq!(missing, vec!["snonce", "mic"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_ssid_rejected() {
        let mut handshake = handshake_for(b"correct123", b"TestNet", 0x010a);
        handshake.ssid = None;
        assert!(matches!(
            CrackEngine::new(&handshake),
            Err(CrackError::MissingSsid)
        ));
    }
}
