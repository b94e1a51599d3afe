/*!
 * Decoded 802.11 frame records
 *
 * The reconstructor only needs a handful of fields from each captured frame:
 * addresses, the EAPOL-Key body of handshake frames and the SSID element of
 * beacons. `Frame::decode` extracts those from raw radiotap/802.11 bytes.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// LLC/SNAP header announcing an EAPOL (0x888E) payload
const EAPOL_SNAP: [u8; 8] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E];

/// EAPOL packet type for EAPOL-Key frames
const EAPOL_TYPE_KEY: u8 = 3;

/// Minimum EAPOL-Key length: header up to and including the key data length
pub const EAPOL_KEY_MIN_LEN: usize = 99;

/// Offset and length of the nonce inside an EAPOL frame
pub const NONCE_OFFSET: usize = 17;
/// Offset of the MIC field inside an EAPOL frame
pub const MIC_OFFSET: usize = 81;
/// Length of the MIC field
pub const MIC_LEN: usize = 16;

// Key information flags
pub const KEY_INFO_PAIRWISE: u16 = 0x0008;
pub const KEY_INFO_INSTALL: u16 = 0x0040;
pub const KEY_INFO_ACK: u16 = 0x0080;
pub const KEY_INFO_MIC: u16 = 0x0100;
pub const KEY_INFO_SECURE: u16 = 0x0200;

/// 48-bit hardware address
///
/// Ordering is lexicographic over the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(MacAddr)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Capture link layer of the raw frame bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Bare 802.11 frames (DLT 105)
    Ieee80211,
    /// 802.11 frames behind a radiotap header (DLT 127)
    Radiotap,
}

impl LinkType {
    /// Map a pcap DLT number to a supported link type
    pub fn from_dlt(dlt: i32) -> Option<Self> {
        match dlt {
            105 => Some(LinkType::Ieee80211),
            127 => Some(LinkType::Radiotap),
            _ => None,
        }
    }
}

/// EAPOL-Key frame body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolKey {
    /// Key information flags (big endian in the frame)
    pub key_info: u16,
    pub nonce: [u8; 32],
    pub mic: [u8; 16],
    /// Complete EAPOL frame, truncated to `4 + body length`
    pub raw: Vec<u8>,
}

impl EapolKey {
    /// Parse an EAPOL frame starting at its protocol version byte
    ///
    /// Returns `None` for non-Key packets and truncated frames. Trailing bytes
    /// past the declared body length (padding, FCS) are dropped.
    pub fn parse(eapol: &[u8]) -> Option<Self> {
        if eapol.len() < 4 || eapol[1] != EAPOL_TYPE_KEY {
            return None;
        }

        let body_len = u16::from_be_bytes([eapol[2], eapol[3]]) as usize;
        let total_len = 4 + body_len;
        if total_len < EAPOL_KEY_MIN_LEN || eapol.len() < total_len {
            return None;
        }
        let eapol = &eapol[..total_len];

        let key_info = u16::from_be_bytes([eapol[5], eapol[6]]);
        let nonce: [u8; 32] = eapol[NONCE_OFFSET..NONCE_OFFSET + 32].try_into().ok()?;
        let mic: [u8; 16] = eapol[MIC_OFFSET..MIC_OFFSET + MIC_LEN].try_into().ok()?;

        Some(EapolKey {
            key_info,
            nonce,
            mic,
            raw: eapol.to_vec(),
        })
    }

    pub fn has(&self, flag: u16) -> bool {
        self.key_info & flag != 0
    }

    /// Copy of the raw frame with the MIC field zeroed
    pub fn zeroed_mic_frame(&self) -> Vec<u8> {
        let mut data = self.raw.clone();
        data[MIC_OFFSET..MIC_OFFSET + MIC_LEN].fill(0);
        data
    }
}

/// Body of a decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// EAPOL-Key handshake frame
    Eapol(EapolKey),
    /// Beacon or probe response; `None` when the SSID is hidden or absent
    Beacon { ssid: Option<Vec<u8>> },
    /// Anything else
    Other,
}

/// Decoded frame record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub source: MacAddr,
    pub destination: MacAddr,
    pub bssid: MacAddr,
    pub body: FrameBody,
}

impl Frame {
    /// Decode one captured packet
    ///
    /// Returns `None` when the bytes are too short or not a frame we model.
    pub fn decode(data: &[u8], link: LinkType) -> Option<Frame> {
        let frame = match link {
            LinkType::Ieee80211 => data,
            LinkType::Radiotap => {
                if data.len() < 4 {
                    return None;
                }
                let radiotap_len = u16::from_le_bytes([data[2], data[3]]) as usize;
                data.get(radiotap_len..)?
            }
        };
        decode_ieee80211(frame)
    }
}

fn decode_ieee80211(frame: &[u8]) -> Option<Frame> {
    if frame.len() < 24 {
        return None;
    }

    let frame_control = u16::from_le_bytes([frame[0], frame[1]]);
    let frame_type = (frame_control >> 2) & 0x3;
    let subtype = (frame_control >> 4) & 0xF;
    let to_ds = frame_control & 0x0100 != 0;
    let from_ds = frame_control & 0x0200 != 0;

    let addr1 = MacAddr::from_slice(&frame[4..10])?;
    let addr2 = MacAddr::from_slice(&frame[10..16])?;
    let addr3 = MacAddr::from_slice(&frame[16..22])?;

    match frame_type {
        // Management: beacon (8) and probe response (5)
        0 => {
            if subtype != 8 && subtype != 5 {
                return Some(Frame {
                    source: addr2,
                    destination: addr1,
                    bssid: addr3,
                    body: FrameBody::Other,
                });
            }
            Some(Frame {
                source: addr2,
                destination: addr1,
                bssid: addr3,
                body: FrameBody::Beacon {
                    ssid: parse_ssid_element(frame.get(36..)?),
                },
            })
        }
        // Data
        2 => {
            // Addr1=RA, Addr2=TA, Addr3 depends on the DS bits
            let (destination, source, bssid) = match (to_ds, from_ds) {
                (false, false) => (addr1, addr2, addr3),
                (false, true) => (addr1, addr3, addr2),
                (true, false) => (addr3, addr2, addr1),
                (true, true) => return None, // WDS, not a station handshake
            };

            let has_qos = subtype & 0x8 != 0;
            let has_htc = has_qos && frame_control & 0x8000 != 0;
            let header_len = 24 + if has_qos { 2 } else { 0 } + if has_htc { 4 } else { 0 };

            let body = match frame.get(header_len..) {
                Some(llc) if llc.len() >= 8 && llc[..8] == EAPOL_SNAP => {
                    EapolKey::parse(&llc[8..]).map_or(FrameBody::Other, FrameBody::Eapol)
                }
                _ => FrameBody::Other,
            };

            Some(Frame {
                source,
                destination,
                bssid,
                body,
            })
        }
        _ => None,
    }
}

/// Walk tagged elements and return the SSID (element 0)
///
/// Empty or all-NUL SSIDs (hidden networks) yield `None`.
fn parse_ssid_element(elements: &[u8]) -> Option<Vec<u8>> {
    let mut i = 0;
    while i + 2 <= elements.len() {
        let id = elements[i];
        let len = elements[i + 1] as usize;
        let start = i + 2;
        let end = start + len;
        if end > elements.len() {
            break;
        }

        if id == 0 {
            let ssid = &elements[start..end];
            if ssid.is_empty() || ssid.len() > 32 || ssid.iter().all(|b| *b == 0) {
                return None;
            }
            return Some(ssid.to_vec());
        }
        i = end;
    }
    None
}
