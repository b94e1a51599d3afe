/*!
 * Capture file reading
 *
 * Reads legacy pcap and pcapng files (airodump-ng, wireshark, tcpdump ...)
 * and decodes every packet into a `Frame`. Only 802.11 link types are
 * accepted; packets that do not decode are skipped.
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;

use pcap_parser::{create_reader, Block, PcapBlockOwned, PcapError};

use crate::error::{CrackError, Result};
use crate::frame::{Frame, LinkType};

const READER_BUFFER: usize = 65536;

/// Read and decode all frames from a capture file
pub fn read_capture(path: &Path) -> Result<Vec<Frame>> {
    let file = File::open(path).map_err(|e| CrackError::open(path, e))?;
    let frames = parse_capture(file)?;
    tracing::info!(
        "Decoded {} frames from capture {}",
        frames.len(),
        path.display()
    );
    Ok(frames)
}

/// Decode all frames from a pcap/pcapng stream
pub fn parse_capture<R: Read + Send>(reader: R) -> Result<Vec<Frame>> {
    let mut reader = create_reader(READER_BUFFER, reader)
        .map_err(|e| CrackError::Capture(format!("{:?}", e)))?;

    let mut frames = Vec::new();
    // pcapng carries one link type per interface, legacy pcap one per file
    let mut interfaces: Vec<i32> = Vec::new();
    let mut legacy_link: Option<i32> = None;
    let mut skipped = 0u64;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let packet = match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        legacy_link = Some(header.network.0);
                        None
                    }
                    PcapBlockOwned::Legacy(packet) => legacy_link.map(|dlt| (dlt, packet.data)),
                    PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                        interfaces.clear();
                        None
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        interfaces.push(idb.linktype.0);
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        let caplen = (epb.caplen as usize).min(epb.data.len());
                        interfaces
                            .get(epb.if_id as usize)
                            .map(|dlt| (*dlt, &epb.data[..caplen]))
                    }
                    PcapBlockOwned::NG(_) => None,
                };

                if let Some((dlt, data)) = packet {
                    let link = LinkType::from_dlt(dlt).ok_or(CrackError::UnsupportedLinkType(dlt))?;
                    match Frame::decode(data, link) {
                        Some(frame) => frames.push(frame),
                        None => skipped += 1,
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| CrackError::Capture(format!("{:?}", e)))?;
            }
            Err(e) => return Err(CrackError::Capture(format!("{:?}", e))),
        }
    }

    tracing::debug!("Skipped {} undecodable packets", skipped);
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::tests::{beacon_frame, data_frame, eapol_key, AP, CLIENT};
    use crate::frame::FrameBody;

    /// Serialize packets as a little-endian legacy pcap file
    pub(crate) fn legacy_pcap(dlt: u32, packets: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&dlt.to_le_bytes());
        for (i, packet) in packets.iter().enumerate() {
            out.extend_from_slice(&(i as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
            out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
            out.extend_from_slice(packet);
        }
        out
    }

    #[test]
    fn test_parse_legacy_pcap() {
        let packets = vec![
            beacon_frame(AP, b"TestNet"),
            data_frame(true, AP, CLIENT, &eapol_key(0x008a, [1; 32], [0; 16])),
            vec![0u8; 5], // garbage, skipped
        ];
        let bytes = legacy_pcap(105, &packets);

        let frames = parse_capture(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0].body, FrameBody::Beacon { .. }));
        assert!(matches!(frames[1].body, FrameBody::Eapol(_)));
    }

    #[test]
    fn test_unsupported_link_type() {
        let bytes = legacy_pcap(1, &[vec![0u8; 64]]);
        let err = parse_capture(std::io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, CrackError::UnsupportedLinkType(1)));
    }

    #[test]
    fn test_not_a_capture() {
        let err = parse_capture(std::io::Cursor::new(b"not a capture file at all".to_vec()))
            .unwrap_err();
        assert!(matches!(err, CrackError::Capture(_)));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = read_capture(Path::new("/nonexistent/capture.cap")).unwrap_err();
        assert!(matches!(err, CrackError::Open { .. }));
    }
}
