/*!
 * WPA/WPA2 key derivation and MIC verification
 *
 * Implements the cryptographic chain used to test a passphrase against a
 * captured handshake:
 * - PMK (Pairwise Master Key) derivation using PBKDF2-HMAC-SHA1
 * - PTK (Pairwise Transient Key) expansion using PRF-512
 * - MIC (Message Integrity Code) over the EAPOL-Key frame of message 2
 *
 * References:
 * - IEEE 802.11i-2004 standard (8.5.1, H.4)
 * - RFC 2898 (PBKDF2)
 */

use hmac::{Hmac, Mac};
use md5::Md5;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;
type HmacMd5 = Hmac<Md5>;

/// 32-byte Pairwise Master Key
pub type Pmk = [u8; 32];

/// Label used by the PTK expansion
pub const PTK_LABEL: &[u8] = b"Pairwise key expansion";

/// PBKDF2 iteration count mandated for WPA-PSK
pub const PMK_ITERATIONS: u32 = 4096;

/// Length of the PTK context: NUL + 2 MACs + 2 nonces
pub const PKE_CONTEXT_LEN: usize = 1 + 6 + 6 + 32 + 32;

/// Byte offset of the key information low byte inside an EAPOL frame
const KEY_INFO_LOW_OFFSET: usize = 6;

/// MIC algorithm selected by the key descriptor version.
///
/// Version 1 (TKIP) uses HMAC-MD5, version 2 (CCMP) uses HMAC-SHA1-128.
/// The two are told apart by bit 1 of the key information field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicSuite {
    /// HMAC-MD5, key descriptor version 1
    Legacy,
    /// HMAC-SHA1 truncated to 16 bytes, key descriptor version 2
    Aes,
}

impl MicSuite {
    /// Derive the suite from the 16-bit key information field
    pub fn from_key_info(key_info: u16) -> Self {
        if key_info & 0b0000_0010 != 0 {
            MicSuite::Aes
        } else {
            MicSuite::Legacy
        }
    }

    /// Derive the suite from a raw EAPOL frame (key info low byte at offset 6)
    ///
    /// Frames too short to carry a key information field resolve to `Legacy`;
    /// they can never produce a matching MIC anyway.
    pub fn from_eapol(eapol_frame: &[u8]) -> Self {
        match eapol_frame.get(KEY_INFO_LOW_OFFSET) {
            Some(low) => Self::from_key_info(u16::from(*low)),
            None => MicSuite::Legacy,
        }
    }
}

/// Calculate PMK (Pairwise Master Key) from passphrase and SSID
///
/// PMK = PBKDF2(passphrase, SSID, 4096 iterations, 256 bits)
///
/// This is the most computationally expensive part of WPA/WPA2 cracking.
/// Each password requires 4096 iterations of HMAC-SHA1.
///
/// # Arguments
/// * `passphrase` - Candidate passphrase bytes (length is not validated)
/// * `ssid` - Network SSID bytes (used as salt)
#[inline]
pub fn calculate_pmk(passphrase: &[u8], ssid: &[u8]) -> Pmk {
    let mut pmk = [0u8; 32];
    pbkdf2_hmac::<Sha1>(passphrase, ssid, PMK_ITERATIONS, &mut pmk);
    pmk
}

/// Build the PTK expansion context
///
/// NUL || min(AA, SPA) || max(AA, SPA) || min(ANonce, SNonce) || max(ANonce, SNonce)
///
/// Ordering is lexicographic over raw bytes.
pub fn pke_context(
    ap_mac: &[u8; 6],
    client_mac: &[u8; 6],
    anonce: &[u8; 32],
    snonce: &[u8; 32],
) -> [u8; PKE_CONTEXT_LEN] {
    let mut context = [0u8; PKE_CONTEXT_LEN];

    let (mac_lo, mac_hi) = if ap_mac < client_mac {
        (ap_mac, client_mac)
    } else {
        (client_mac, ap_mac)
    };
    let (nonce_lo, nonce_hi) = if anonce < snonce {
        (anonce, snonce)
    } else {
        (snonce, anonce)
    };

    context[1..7].copy_from_slice(mac_lo);
    context[7..13].copy_from_slice(mac_hi);
    context[13..45].copy_from_slice(nonce_lo);
    context[45..77].copy_from_slice(nonce_hi);
    context
}

/// PRF-512: expand a key into 64 bytes of key material
///
/// Four HMAC-SHA1 blocks over `label || context || counter` (counter 0..3).
/// The fourth block is truncated to 4 bytes.
#[inline]
pub fn expand_key(key: &[u8], label: &[u8], context: &[u8]) -> [u8; 64] {
    let mut result = [0u8; 64];

    for i in 0..4u8 {
        let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(label);
        mac.update(context);
        mac.update(&[i]);
        let hash = mac.finalize().into_bytes();

        let start = i as usize * 20;
        let end = std::cmp::min(start + 20, 64);
        result[start..end].copy_from_slice(&hash[..end - start]);
    }
    result
}

/// Calculate PTK (Pairwise Transient Key) from PMK and handshake data
///
/// # Returns
/// 64-byte PTK (the first 16 bytes are the KCK)
#[inline]
pub fn calculate_ptk(
    pmk: &Pmk,
    ap_mac: &[u8; 6],
    client_mac: &[u8; 6],
    anonce: &[u8; 32],
    snonce: &[u8; 32],
) -> [u8; 64] {
    let context = pke_context(ap_mac, client_mac, anonce, snonce);
    expand_key(pmk, PTK_LABEL, &context)
}

/// Extract the KCK (first 16 bytes) from a PTK
#[inline]
pub fn kck(ptk: &[u8; 64]) -> [u8; 16] {
    let mut kck = [0u8; 16];
    kck.copy_from_slice(&ptk[..16]);
    kck
}

/// Calculate MIC (Message Integrity Code) for an EAPOL frame
///
/// MIC = HMAC-SHA1(KCK, EAPOL_frame)[0..16]  (Aes)
/// MIC = HMAC-MD5(KCK, EAPOL_frame)          (Legacy)
///
/// # Arguments
/// * `kck` - Key Confirmation Key (first 16 bytes of PTK)
/// * `eapol_frame` - EAPOL frame with MIC field zeroed
/// * `suite` - MIC algorithm of the handshake
#[inline]
pub fn calculate_mic(kck: &[u8; 16], eapol_frame: &[u8], suite: MicSuite) -> [u8; 16] {
    let mut result = [0u8; 16];

    match suite {
        MicSuite::Legacy => {
            let mut mac = HmacMd5::new_from_slice(kck).expect("HMAC can take key of any size");
            mac.update(eapol_frame);
            result.copy_from_slice(&mac.finalize().into_bytes());
        }
        MicSuite::Aes => {
            let mut mac = HmacSha1::new_from_slice(kck).expect("HMAC can take key of any size");
            mac.update(eapol_frame);
            let hash = mac.finalize().into_bytes();
            result.copy_from_slice(&hash[..16]);
        }
    }
    result
}

/// Constant-time comparison for a 16-byte MIC
#[inline(always)]
pub(crate) fn constant_time_compare_16(a: &[u8; 16], b: &[u8]) -> bool {
    if b.len() != 16 {
        return false;
    }

    let mut diff = 0u8;
    for i in 0..16 {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}
