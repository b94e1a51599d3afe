/*!
 * WPA/WPA2 half-handshake reconstruction
 *
 * Offline cracking only needs messages 1 and 2 of the 4-way handshake:
 * - Message 1 (AP → client) carries the ANonce
 * - Message 2 (client → AP) carries the SNonce, the MIC and the frame the MIC
 *   was computed over
 *
 * Frames are grouped per (AP, client) pair and merged into `Handshake`
 * records. A field, once set, is never overwritten by a later frame.
 */

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::read_capture;
use crate::error::{CrackError, Result};
use crate::frame::{
    EapolKey, Frame, FrameBody, MacAddr, KEY_INFO_ACK, KEY_INFO_INSTALL, KEY_INFO_MIC,
    KEY_INFO_PAIRWISE, KEY_INFO_SECURE,
};

/// Handshake message role of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// AP → client, ANonce, no MIC
    Message1,
    /// Client → AP, SNonce and MIC
    Message2,
    /// Not an EAPOL-Key frame, or message 3/4, or a group key frame
    NotHandshake,
}

/// Partial handshake observed in a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeFragment {
    pub ap_mac: MacAddr,
    pub client_mac: MacAddr,
    pub anonce: Option<[u8; 32]>,
    pub snonce: Option<[u8; 32]>,
    pub mic: Option<[u8; 16]>,
    /// EAPOL frame of message 2 with the MIC field zeroed
    pub data: Option<Vec<u8>>,
    /// Only ever set from a beacon, never from handshake frames
    pub ssid: Option<Vec<u8>>,
}

/// Handshake record merged from fragments of one (AP, client) pair
///
/// ap_mac is always the source of message 1, whichever frame supplied it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub ap_mac: Option<MacAddr>,
    pub client_mac: Option<MacAddr>,
    pub anonce: Option<[u8; 32]>,
    pub snonce: Option<[u8; 32]>,
    pub mic: Option<[u8; 16]>,
    pub data: Option<Vec<u8>>,
    pub ssid: Option<Vec<u8>>,
}

impl Handshake {
    /// True when every field needed to test a PMK is present
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the fields still missing for an attack
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ap_mac.is_none() {
            missing.push("ap_mac");
        }
        if self.client_mac.is_none() {
            missing.push("client_mac");
        }
        if self.anonce.is_none() {
            missing.push("anonce");
        }
        if self.snonce.is_none() {
            missing.push("snonce");
        }
        if self.mic.is_none() {
            missing.push("mic");
        }
        if self.data.is_none() {
            missing.push("data");
        }
        missing
    }

    /// SSID for display, lossily decoded
    pub fn ssid_display(&self) -> String {
        match &self.ssid {
            Some(ssid) => String::from_utf8_lossy(ssid).into_owned(),
            None => "<unknown>".to_string(),
        }
    }

    /// Load handshake from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CrackError::open(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save handshake to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Classify a decoded frame by its key information flags
pub fn classify(frame: &Frame) -> MessageKind {
    match &frame.body {
        FrameBody::Eapol(key) => classify_key(key),
        _ => MessageKind::NotHandshake,
    }
}

fn classify_key(key: &EapolKey) -> MessageKind {
    if !key.has(KEY_INFO_PAIRWISE) {
        return MessageKind::NotHandshake;
    }

    let ack = key.has(KEY_INFO_ACK);
    let mic = key.has(KEY_INFO_MIC);
    let install = key.has(KEY_INFO_INSTALL);
    let secure = key.has(KEY_INFO_SECURE);

    match (ack, mic, install, secure) {
        (true, false, false, _) => MessageKind::Message1,
        // Message 4 shares these flags on WPA1; it carries an all-zero nonce
        (false, true, false, false) if key.nonce.iter().any(|b| *b != 0) => MessageKind::Message2,
        _ => MessageKind::NotHandshake,
    }
}

/// Extract the handshake fragment carried by a frame
pub fn extract(frame: &Frame) -> Option<HandshakeFragment> {
    let FrameBody::Eapol(key) = &frame.body else {
        return None;
    };

    match classify_key(key) {
        MessageKind::Message1 => Some(HandshakeFragment {
            ap_mac: frame.source,
            client_mac: frame.destination,
            anonce: Some(key.nonce),
            snonce: None,
            mic: None,
            data: None,
            ssid: None,
        }),
        MessageKind::Message2 => Some(HandshakeFragment {
            ap_mac: frame.destination,
            client_mac: frame.source,
            anonce: None,
            snonce: Some(key.nonce),
            mic: Some(key.mic),
            data: Some(key.zeroed_mic_frame()),
            ssid: None,
        }),
        MessageKind::NotHandshake => None,
    }
}

/// Merge a fragment into a handshake, first-set-wins
pub fn merge(existing: Handshake, fragment: &HandshakeFragment) -> Handshake {
    Handshake {
        ap_mac: existing.ap_mac.or(Some(fragment.ap_mac)),
        client_mac: existing.client_mac.or(Some(fragment.client_mac)),
        anonce: existing.anonce.or(fragment.anonce),
        snonce: existing.snonce.or(fragment.snonce),
        mic: existing.mic.or(fragment.mic),
        data: existing.data.or_else(|| fragment.data.clone()),
        ssid: existing.ssid.or_else(|| fragment.ssid.clone()),
    }
}

/// Rebuild handshakes from a sequence of decoded frames
///
/// Output is in order of the first frame seen for each (AP, client) pair.
/// SSIDs come from beacons or probe responses of the AP anywhere in the
/// capture.
pub fn reconstruct(frames: &[Frame]) -> Vec<Handshake> {
    let mut handshakes: Vec<Handshake> = Vec::new();
    let mut by_pair: HashMap<(MacAddr, MacAddr), usize> = HashMap::new();
    let mut ssids: HashMap<MacAddr, Vec<u8>> = HashMap::new();

    for frame in frames {
        if let FrameBody::Beacon { ssid: Some(ssid) } = &frame.body {
            ssids.entry(frame.bssid).or_insert_with(|| ssid.clone());
            continue;
        }

        let Some(fragment) = extract(frame) else {
            continue;
        };

        let pair = (fragment.ap_mac, fragment.client_mac);
        match by_pair.get(&pair) {
            Some(&i) => {
                let current = std::mem::take(&mut handshakes[i]);
                handshakes[i] = merge(current, &fragment);
            }
            None => {
                by_pair.insert(pair, handshakes.len());
                handshakes.push(merge(Handshake::default(), &fragment));
            }
        }
    }

    for hs in &mut handshakes {
        if hs.ssid.is_none() {
            hs.ssid = hs.ap_mac.and_then(|ap| ssids.get(&ap)).cloned();
        }
    }
    handshakes
}

/// Load handshakes from a capture (.cap/.pcap/.pcapng) or a JSON export
pub fn load_handshakes(path: &Path) -> Result<Vec<Handshake>> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "json" => Ok(vec![Handshake::load_from_file(path)?]),
        _ => Ok(reconstruct(&read_capture(path)?)),
    }
}

/// Choose the handshake to attack
///
/// Priority:
/// 1. Explicit index (`id`), with `ssid` applied when given
/// 2. A single handshake plus a provided SSID (forces the SSID)
/// 3. The handshake whose beacon SSID equals the provided SSID
/// 4. The only handshake of the capture
pub fn select_handshake(
    handshakes: &[Handshake],
    ssid: Option<&[u8]>,
    id: Option<usize>,
) -> Result<Handshake> {
    if handshakes.is_empty() {
        return Err(CrackError::Selection(
            "no EAPOL handshake frames found".to_string(),
        ));
    }

    if let Some(id) = id {
        let mut chosen = handshakes.get(id).cloned().ok_or_else(|| {
            CrackError::Selection(format!(
                "handshake id {} out of range (0..{})",
                id,
                handshakes.len()
            ))
        })?;
        if let Some(ssid) = ssid {
            if chosen.ssid.as_deref().is_some_and(|s| s != ssid) {
                tracing::warn!(
                    "Provided SSID '{}' differs from broadcast SSID '{}', using provided",
                    String::from_utf8_lossy(ssid),
                    chosen.ssid_display()
                );
            }
            chosen.ssid = Some(ssid.to_vec());
        }
        return Ok(chosen);
    }

    match ssid {
        Some(ssid) if handshakes.len() == 1 => {
            let mut chosen = handshakes[0].clone();
            chosen.ssid = Some(ssid.to_vec());
            Ok(chosen)
        }
        Some(ssid) => handshakes
            .iter()
            .find(|hs| hs.ssid.as_deref() == Some(ssid))
            .cloned()
            .ok_or_else(|| {
                CrackError::Selection(format!(
                    "no handshake for SSID '{}', choose one with --id",
                    String::from_utf8_lossy(ssid)
                ))
            }),
        None if handshakes.len() == 1 => Ok(handshakes[0].clone()),
        None => Err(CrackError::Selection(format!(
            "{} handshakes found, choose one with --id",
            handshakes.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::{beacon_frame, data_frame, eapol_key, AP, CLIENT};
    use crate::frame::{LinkType, MIC_OFFSET};

    fn m1(anonce: [u8; 32]) -> Frame {
        let raw = data_frame(true, AP, CLIENT, &eapol_key(0x008a, anonce, [0; 16]));
        Frame::decode(&raw, LinkType::Ieee80211).unwrap()
    }

    fn m2(snonce: [u8; 32], mic: [u8; 16]) -> Frame {
        let raw = data_frame(false, AP, CLIENT, &eapol_key(0x010a, snonce, mic));
        Frame::decode(&raw, LinkType::Ieee80211).unwrap()
    }

    fn beacon(ssid: &[u8]) -> Frame {
        Frame::decode(&beacon_frame(AP, ssid), LinkType::Ieee80211).unwrap()
    }

    #[test]
    fn test_classify_messages() {
        assert_eq!(classify(&m1([1; 32])), MessageKind::Message1);
        assert_eq!(classify(&m2([2; 32], [3; 16])), MessageKind::Message2);
        assert_eq!(classify(&beacon(b"TestNet")), MessageKind::NotHandshake);

        let decode = |key_info: u16, nonce: [u8; 32]| {
            let raw = data_frame(true, AP, CLIENT, &eapol_key(key_info, nonce, [3; 16]));
            classify(&Frame::decode(&raw, LinkType::Ieee80211).unwrap())
        };
        // Message 3: ACK + MIC + install
        assert_eq!(decode(0x13ca, [1; 32]), MessageKind::NotHandshake);
        // Message 4: MIC + secure
        assert_eq!(decode(0x030a, [0; 32]), MessageKind::NotHandshake);
        // WPA1 message 4: MIC without secure, zero nonce
        assert_eq!(decode(0x0109, [0; 32]), MessageKind::NotHandshake);
        // Group key message
        assert_eq!(decode(0x0382, [1; 32]), MessageKind::NotHandshake);
    }

    #[test]
    fn test_extract_orientation() {
        let first = extract(&m1([1; 32])).unwrap();
        assert_eq!(first.ap_mac, AP);
        assert_eq!(first.client_mac, CLIENT);
        assert_eq!(first.anonce, Some([1; 32]));
        assert!(first.mic.is_none());

        let second = extract(&m2([2; 32], [3; 16])).unwrap();
        assert_eq!(second.ap_mac, AP);
        assert_eq!(second.client_mac, CLIENT);
        assert_eq!(second.snonce, Some([2; 32]));
        assert_eq!(second.mic, Some([3; 16]));

        let data = second.data.unwrap();
        let mut expected = eapol_key(0x010a, [2; 32], [3; 16]);
        expected[MIC_OFFSET..MIC_OFFSET + 16].fill(0);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fragment = extract(&m2([2; 32], [3; 16])).unwrap();
        let once = merge(Handshake::default(), &fragment);
        let twice = merge(once.clone(), &fragment);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_first_set_wins() {
        let first = extract(&m1([1; 32])).unwrap();
        let retransmit = extract(&m1([9; 32])).unwrap();
        let hs = merge(merge(Handshake::default(), &first), &retransmit);
        assert_eq!(hs.anonce, Some([1; 32]));
    }

    #[test]
    fn test_completeness_is_monotonic() {
        let fragments = [
            extract(&m1([1; 32])).unwrap(),
            extract(&m2([2; 32], [3; 16])).unwrap(),
            extract(&m1([7; 32])).unwrap(),
            extract(&m2([8; 32], [9; 16])).unwrap(),
        ];

        let mut hs = Handshake::default();
        assert!(!hs.is_complete());
        let mut was_complete = false;
        for fragment in &fragments {
            hs = merge(hs, fragment);
            if was_complete {
                assert!(hs.is_complete());
            }
            was_complete = hs.is_complete();
        }
        assert!(was_complete);
    }

    #[test]
    fn test_reconstruct_pairs_and_ssid() {
        let other_client = MacAddr([0x22; 6]);
        let lone = Frame::decode(
            &data_frame(true, AP, other_client, &eapol_key(0x008a, [5; 32], [0; 16])),
            LinkType::Ieee80211,
        )
        .unwrap();

        let frames = vec![m1([1; 32]), lone, m2([2; 32], [3; 16]), beacon(b"TestNet")];
        let handshakes = reconstruct(&frames);

        assert_eq!(handshakes.len(), 2);
        assert_eq!(handshakes[0].client_mac, Some(CLIENT));
        assert!(handshakes[0].is_complete());
        assert_eq!(handshakes[0].ssid.as_deref(), Some(&b"TestNet"[..]));

        assert_eq!(handshakes[1].client_mac, Some(other_client));
        assert!(!handshakes[1].is_complete());
        assert_eq!(handshakes[1].missing_fields(), vec!["snonce", "mic", "data"]);
    }

    #[test]
    fn test_reconstruct_message_2_before_message_1() {
        let frames = vec![m2([2; 32], [3; 16]), m1([1; 32])];
        let handshakes = reconstruct(&frames);
        assert_eq!(handshakes.len(), 1);
        assert_eq!(handshakes[0].ap_mac, Some(AP));
        assert!(handshakes[0].is_complete());
        assert!(handshakes[0].ssid.is_none());
    }

    #[test]
    fn test_select_handshake() {
        let mut a = reconstruct(&[m1([1; 32]), m2([2; 32], [3; 16])]).remove(0);
        a.ssid = Some(b"Alpha".to_vec());
        let mut b = a.clone();
        b.ssid = Some(b"Beta".to_vec());
        let list = vec![a.clone(), b.clone()];

        assert_eq!(select_handshake(&list, Some(&b"Beta"[..]), None).unwrap(), b);
        assert_eq!(select_handshake(&list, None, Some(0)).unwrap(), a);
        assert!(matches!(
            select_handshake(&list, None, None),
            Err(CrackError::Selection(_))
        ));
        assert!(matches!(
            select_handshake(&list, Some(&b"Gamma"[..]), None),
            Err(CrackError::Selection(_))
        ));
        assert!(select_handshake(&list, None, Some(5)).is_err());
        assert!(select_handshake(&[], None, None).is_err());

        // A single handshake takes the provided SSID
        let single = select_handshake(&list[..1], Some(&b"Forced"[..]), None).unwrap();
        assert_eq!(single.ssid.as_deref(), Some(&b"Forced"[..]));
    }

    #[test]
    fn test_json_export_roundtrip() {
        let mut hs = reconstruct(&[m1([1; 32]), m2([2; 32], [3; 16])]).remove(0);
        hs.ssid = Some(b"TestNet".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handshake.json");
        hs.save_to_file(&path).unwrap();

        let loaded = load_handshakes(&path).unwrap();
        assert_eq!(loaded, vec![hs]);
    }
}
