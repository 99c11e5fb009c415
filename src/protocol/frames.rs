//! Wire frame layout and the outbound command codec.
//!
//! Frame format: 2 identifying header bytes + 1 reserved/version byte,
//! followed by a fixed-layout payload of little-endian signed 16-bit fields.
//! The payload length is a pure function of the header bytes; a frame whose
//! length disagrees with its header is rejected.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::commands::{ChirpParams, Command, MicParams};

/// Reserved/version byte carried by every frame.
pub const FRAME_VERSION: u8 = 0x00;

/// Identifying bytes for the chirp playback frame ("CP").
pub const PLAY_HEADER: [u8; 2] = [0x43, 0x50];
/// Identifying bytes for the chirp configuration frame ("CC").
pub const CHIRP_CONFIG_HEADER: [u8; 2] = [0x43, 0x43];
/// Identifying bytes for the microphone configuration frame ("MC").
pub const MIC_CONFIG_HEADER: [u8; 2] = [0x4D, 0x43];

/// Frame kinds, distinguished by their two identifying header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Trigger chirp playback.
    Play,
    /// Chirp generator configuration.
    ChirpConfig,
    /// Microphone capture configuration.
    MicConfig,
}

impl FrameKind {
    /// Header size in bytes (2 identifying + 1 reserved/version).
    pub const HEADER_SIZE: usize = 3;

    /// Identify a frame kind from its two header bytes.
    pub fn from_header(header: [u8; 2]) -> Option<Self> {
        match header {
            PLAY_HEADER => Some(Self::Play),
            CHIRP_CONFIG_HEADER => Some(Self::ChirpConfig),
            MIC_CONFIG_HEADER => Some(Self::MicConfig),
            _ => None,
        }
    }

    /// The two identifying header bytes for this kind.
    pub fn header(&self) -> [u8; 2] {
        match self {
            Self::Play => PLAY_HEADER,
            Self::ChirpConfig => CHIRP_CONFIG_HEADER,
            Self::MicConfig => MIC_CONFIG_HEADER,
        }
    }

    /// Payload length implied by the header.
    pub fn payload_length(&self) -> usize {
        match self {
            Self::Play => 0,
            Self::ChirpConfig => 8,
            Self::MicConfig => 4,
        }
    }

    /// Total frame length for this kind.
    pub fn frame_length(&self) -> usize {
        Self::HEADER_SIZE + self.payload_length()
    }
}

/// A complete outbound frame: header plus fixed-layout payload.
///
/// Wire frames are the only objects that cross the transport boundary
/// outward; [`WireFrame::to_bytes`] yields the exact on-air byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// The frame kind, determining header bytes and payload layout.
    pub kind: FrameKind,
    /// The fixed-layout payload.
    pub payload: Vec<u8>,
}

impl WireFrame {
    pub(crate) fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Parse a frame from raw bytes, rejecting unknown headers and any
    /// length that disagrees with the header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FrameKind::HEADER_SIZE {
            return Err(Error::DecodeMismatch {
                context: format!("frame too short: {} bytes", data.len()),
            });
        }

        let kind = FrameKind::from_header([data[0], data[1]]).ok_or_else(|| Error::DecodeMismatch {
            context: format!("unknown header: {:#04x} {:#04x}", data[0], data[1]),
        })?;

        if data.len() != kind.frame_length() {
            return Err(Error::DecodeMismatch {
                context: format!(
                    "{:?} frame has {} bytes, header implies {}",
                    kind,
                    data.len(),
                    kind.frame_length()
                ),
            });
        }

        Ok(Self {
            kind,
            payload: data[FrameKind::HEADER_SIZE..].to_vec(),
        })
    }

    /// Serialize the frame to the on-air byte sequence.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FrameKind::HEADER_SIZE + self.payload.len());
        buf.put_slice(&self.kind.header());
        buf.put_u8(FRAME_VERSION);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

impl Command {
    /// Encode this command into the frame transmitted to the accessory.
    ///
    /// Returns `None` for [`Command::QueryBattery`]: battery is push-only
    /// from the device and served from the session's cache.
    pub fn to_frame(&self) -> Option<WireFrame> {
        match self {
            Self::Play => Some(WireFrame::new(FrameKind::Play, Vec::new())),
            Self::ChirpConfig(params) => {
                let mut payload = BytesMut::with_capacity(8);
                payload.put_i16_le(params.start_freq_hz);
                payload.put_i16_le(params.end_freq_hz);
                payload.put_i16_le(params.amplitude);
                payload.put_i16_le(params.duration_ms);
                Some(WireFrame::new(FrameKind::ChirpConfig, payload.to_vec()))
            }
            Self::MicConfig(params) => {
                let mut payload = BytesMut::with_capacity(4);
                payload.put_i16_le(params.delay_ms);
                payload.put_i16_le(params.window_ms);
                Some(WireFrame::new(FrameKind::MicConfig, payload.to_vec()))
            }
            Self::QueryBattery => None,
        }
    }

    /// Decode an outbound frame back into the command it encodes.
    ///
    /// Inverse of [`Command::to_frame`]: decoding an encoded command
    /// reproduces the original field values bit-for-bit.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let frame = WireFrame::parse(data)?;
        let p = &frame.payload;

        match frame.kind {
            FrameKind::Play => Ok(Self::Play),
            FrameKind::ChirpConfig => Ok(Self::ChirpConfig(ChirpParams {
                start_freq_hz: i16::from_le_bytes([p[0], p[1]]),
                end_freq_hz: i16::from_le_bytes([p[2], p[3]]),
                amplitude: i16::from_le_bytes([p[4], p[5]]),
                duration_ms: i16::from_le_bytes([p[6], p[7]]),
            })),
            FrameKind::MicConfig => Ok(Self::MicConfig(MicParams {
                delay_ms: i16::from_le_bytes([p[0], p[1]]),
                window_ms: i16::from_le_bytes([p[2], p[3]]),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_play_frame_bytes() {
        let frame = Command::Play.to_frame().unwrap();
        assert_eq!(frame.to_bytes().as_ref(), &[0x43, 0x50, 0x00]);
    }

    #[test]
    fn test_chirp_config_frame_layout() {
        let cmd = Command::chirp_config(0x0102, 0x0304, 0x00C8, 0x0506).unwrap();
        let bytes = cmd.to_frame().unwrap().to_bytes();

        // Header + reserved byte.
        assert_eq!(&bytes[..3], &[0x43, 0x43, 0x00]);
        // Little-endian payload in wire order: start, end, amplitude, duration.
        assert_eq!(&bytes[3..5], &[0x02, 0x01]);
        assert_eq!(&bytes[5..7], &[0x04, 0x03]);
        assert_eq!(&bytes[7..9], &[0x06, 0x05]);
        assert_eq!(&bytes[9..11], &[0xC8, 0x00]);
        assert_eq!(bytes.len(), 11);
    }

    #[test]
    fn test_mic_config_frame_layout() {
        let cmd = Command::mic_config(0x0102, 0x0304).unwrap();
        let bytes = cmd.to_frame().unwrap().to_bytes();

        assert_eq!(&bytes[..3], &[0x4D, 0x43, 0x00]);
        assert_eq!(&bytes[3..5], &[0x02, 0x01]);
        assert_eq!(&bytes[5..7], &[0x04, 0x03]);
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn test_query_battery_has_no_frame() {
        assert!(Command::QueryBattery.to_frame().is_none());
    }

    #[test]
    fn test_payload_length_is_function_of_header() {
        assert_eq!(FrameKind::Play.payload_length(), 0);
        assert_eq!(FrameKind::ChirpConfig.payload_length(), 8);
        assert_eq!(FrameKind::MicConfig.payload_length(), 4);

        for kind in [FrameKind::Play, FrameKind::ChirpConfig, FrameKind::MicConfig] {
            assert_eq!(FrameKind::from_header(kind.header()), Some(kind));
        }
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        // Play frame with a trailing byte.
        assert!(Command::parse(&[0x43, 0x50, 0x00, 0x00]).is_err());
        // Chirp config frame one byte short.
        let mut bytes = Command::chirp_config(440, 880, 100, 1_000)
            .unwrap()
            .to_frame()
            .unwrap()
            .to_bytes()
            .to_vec();
        bytes.pop();
        assert!(Command::parse(&bytes).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_header() {
        assert!(WireFrame::parse(&[0x00, 0x01, 0x00]).is_err());
        assert!(WireFrame::parse(&[0x42]).is_err());
    }

    #[test]
    fn test_play_roundtrip() {
        let bytes = Command::Play.to_frame().unwrap().to_bytes();
        assert_eq!(Command::parse(&bytes).unwrap(), Command::Play);
    }

    proptest! {
        #[test]
        fn chirp_config_roundtrip(
            start in ChirpParams::FREQ_MIN_HZ..=ChirpParams::FREQ_MAX_HZ,
            end in ChirpParams::FREQ_MIN_HZ..=ChirpParams::FREQ_MAX_HZ,
            duration in ChirpParams::DURATION_MIN_MS..=ChirpParams::DURATION_MAX_MS,
            amplitude in ChirpParams::AMPLITUDE_MIN..=ChirpParams::AMPLITUDE_MAX,
        ) {
            let cmd = Command::chirp_config(start, end, duration, amplitude).unwrap();
            let bytes = cmd.to_frame().unwrap().to_bytes();
            prop_assert_eq!(Command::parse(&bytes).unwrap(), cmd);
        }

        #[test]
        fn mic_config_roundtrip(
            (delay, window) in (MicParams::DELAY_MIN_MS..=MicParams::DELAY_MAX_MS)
                .prop_flat_map(|d| (Just(d), d..=MicParams::WINDOW_MAX_MS)),
        ) {
            let cmd = Command::mic_config(delay, window).unwrap();
            let bytes = cmd.to_frame().unwrap().to_bytes();
            prop_assert_eq!(Command::parse(&bytes).unwrap(), cmd);
        }
    }
}
