//! Command types and range validation.
//!
//! Commands are constructed only through validated constructors: every field
//! for a given command is range-checked before any value is produced, so
//! invalid input never reaches the codec.

use crate::error::RangeViolation;

fn check(field: &'static str, value: i16, min: i16, max: i16) -> Result<i16, RangeViolation> {
    if value < min || value > max {
        return Err(RangeViolation {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Parameters for a frequency-swept acoustic test chirp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChirpParams {
    pub(crate) start_freq_hz: i16,
    pub(crate) end_freq_hz: i16,
    pub(crate) duration_ms: i16,
    pub(crate) amplitude: i16,
}

impl ChirpParams {
    /// Lowest accepted sweep frequency in Hz.
    pub const FREQ_MIN_HZ: i16 = 10;
    /// Highest accepted sweep frequency in Hz.
    pub const FREQ_MAX_HZ: i16 = 15_000;
    /// Shortest accepted chirp duration in milliseconds.
    pub const DURATION_MIN_MS: i16 = 10;
    /// Longest accepted chirp duration in milliseconds.
    pub const DURATION_MAX_MS: i16 = 200;
    /// Lowest accepted amplitude.
    pub const AMPLITUDE_MIN: i16 = 1;
    /// Highest accepted amplitude.
    pub const AMPLITUDE_MAX: i16 = 2_500;

    /// Validate and construct chirp parameters.
    ///
    /// All fields are checked before any value is produced; the first
    /// violation is returned.
    pub fn new(
        start_freq_hz: i16,
        end_freq_hz: i16,
        duration_ms: i16,
        amplitude: i16,
    ) -> Result<Self, RangeViolation> {
        Ok(Self {
            start_freq_hz: check(
                "start_freq_hz",
                start_freq_hz,
                Self::FREQ_MIN_HZ,
                Self::FREQ_MAX_HZ,
            )?,
            end_freq_hz: check(
                "end_freq_hz",
                end_freq_hz,
                Self::FREQ_MIN_HZ,
                Self::FREQ_MAX_HZ,
            )?,
            duration_ms: check(
                "duration_ms",
                duration_ms,
                Self::DURATION_MIN_MS,
                Self::DURATION_MAX_MS,
            )?,
            amplitude: check(
                "amplitude",
                amplitude,
                Self::AMPLITUDE_MIN,
                Self::AMPLITUDE_MAX,
            )?,
        })
    }

    /// Starting sweep frequency in Hz.
    pub fn start_freq_hz(&self) -> i16 {
        self.start_freq_hz
    }

    /// Ending sweep frequency in Hz.
    pub fn end_freq_hz(&self) -> i16 {
        self.end_freq_hz
    }

    /// Chirp duration in milliseconds.
    pub fn duration_ms(&self) -> i16 {
        self.duration_ms
    }

    /// Playback amplitude.
    pub fn amplitude(&self) -> i16 {
        self.amplitude
    }
}

/// Parameters for a microphone capture window.
///
/// The window runs from the start of chirp playback and must be at least as
/// long as the delay, so the capture never ends before it begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MicParams {
    pub(crate) delay_ms: i16,
    pub(crate) window_ms: i16,
}

impl MicParams {
    /// Lowest accepted capture delay in milliseconds.
    pub const DELAY_MIN_MS: i16 = 0;
    /// Highest accepted capture delay in milliseconds.
    pub const DELAY_MAX_MS: i16 = 800;
    /// Longest accepted capture window in milliseconds.
    pub const WINDOW_MAX_MS: i16 = 1_000;

    /// Validate and construct microphone parameters.
    ///
    /// `window_ms` is checked against `[delay_ms, 1000]`: a window shorter
    /// than the delay is rejected even when it is inside `[0, 1000]`.
    pub fn new(delay_ms: i16, window_ms: i16) -> Result<Self, RangeViolation> {
        let delay_ms = check("delay_ms", delay_ms, Self::DELAY_MIN_MS, Self::DELAY_MAX_MS)?;
        let window_ms = check("window_ms", window_ms, delay_ms, Self::WINDOW_MAX_MS)?;
        Ok(Self {
            delay_ms,
            window_ms,
        })
    }

    /// Capture delay from the start of chirp playback, in milliseconds.
    pub fn delay_ms(&self) -> i16 {
        self.delay_ms
    }

    /// Total capture window length in milliseconds, including the delay.
    pub fn window_ms(&self) -> i16 {
        self.window_ms
    }
}

/// A command the session can dispatch to the accessory.
///
/// Immutable once constructed; the configuration variants can only be built
/// from validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Trigger playback of the configured chirp.
    Play,
    /// Configure the chirp generator.
    ChirpConfig(ChirpParams),
    /// Configure the microphone capture window.
    MicConfig(MicParams),
    /// Read the cached battery level. Battery is push-only from the device,
    /// so this command never crosses the wire.
    QueryBattery,
}

impl Command {
    /// Build a validated chirp configuration command.
    pub fn chirp_config(
        start_freq_hz: i16,
        end_freq_hz: i16,
        duration_ms: i16,
        amplitude: i16,
    ) -> Result<Self, RangeViolation> {
        Ok(Self::ChirpConfig(ChirpParams::new(
            start_freq_hz,
            end_freq_hz,
            duration_ms,
            amplitude,
        )?))
    }

    /// Build a validated microphone configuration command.
    pub fn mic_config(delay_ms: i16, window_ms: i16) -> Result<Self, RangeViolation> {
        Ok(Self::MicConfig(MicParams::new(delay_ms, window_ms)?))
    }

    /// Whether dispatching this command transmits a wire frame.
    pub fn carries_frame(&self) -> bool {
        !matches!(self, Self::QueryBattery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chirp_params_accept_bounds() {
        assert!(ChirpParams::new(10, 15_000, 10, 1).is_ok());
        assert!(ChirpParams::new(15_000, 10, 200, 2_500).is_ok());
    }

    #[test]
    fn test_chirp_params_reject_start_freq() {
        let err = ChirpParams::new(9, 440, 100, 1_000).unwrap_err();
        assert_eq!(err.field, "start_freq_hz");
        assert_eq!(err.min, 10);
        assert_eq!(err.max, 15_000);

        let err = ChirpParams::new(15_001, 440, 100, 1_000).unwrap_err();
        assert_eq!(err.field, "start_freq_hz");
    }

    #[test]
    fn test_chirp_params_reject_end_freq() {
        let err = ChirpParams::new(440, 9, 100, 1_000).unwrap_err();
        assert_eq!(err.field, "end_freq_hz");
    }

    #[test]
    fn test_chirp_params_reject_duration() {
        let err = ChirpParams::new(440, 880, 9, 1_000).unwrap_err();
        assert_eq!(err.field, "duration_ms");

        let err = ChirpParams::new(440, 880, 201, 1_000).unwrap_err();
        assert_eq!(err.field, "duration_ms");
    }

    #[test]
    fn test_chirp_params_reject_amplitude() {
        let err = ChirpParams::new(440, 880, 100, 0).unwrap_err();
        assert_eq!(err.field, "amplitude");

        let err = ChirpParams::new(440, 880, 100, 2_501).unwrap_err();
        assert_eq!(err.field, "amplitude");
    }

    #[test]
    fn test_mic_params_accept_bounds() {
        assert!(MicParams::new(0, 0).is_ok());
        assert!(MicParams::new(800, 1_000).is_ok());
        assert!(MicParams::new(800, 800).is_ok());
    }

    #[test]
    fn test_mic_params_reject_delay() {
        let err = MicParams::new(801, 1_000).unwrap_err();
        assert_eq!(err.field, "delay_ms");
        assert_eq!(err.max, 800);

        let err = MicParams::new(-1, 100).unwrap_err();
        assert_eq!(err.field, "delay_ms");
    }

    #[test]
    fn test_mic_params_reject_window_shorter_than_delay() {
        // 400 is inside [0, 1000] on its own but shorter than the delay.
        let err = MicParams::new(500, 400).unwrap_err();
        assert_eq!(err.field, "window_ms");
        assert_eq!(err.min, 500);
        assert_eq!(err.max, 1_000);
    }

    #[test]
    fn test_mic_params_reject_window_too_long() {
        let err = MicParams::new(0, 1_001).unwrap_err();
        assert_eq!(err.field, "window_ms");
    }

    #[test]
    fn test_validation_is_pure() {
        for _ in 0..3 {
            assert_eq!(MicParams::new(500, 400).unwrap_err().field, "window_ms");
            assert!(MicParams::new(500, 500).is_ok());
        }
    }

    #[test]
    fn test_command_builders() {
        let cmd = Command::chirp_config(440, 880, 100, 1_200).unwrap();
        assert!(matches!(cmd, Command::ChirpConfig(_)));
        assert!(cmd.carries_frame());

        let cmd = Command::mic_config(100, 500).unwrap();
        assert!(matches!(cmd, Command::MicConfig(_)));
        assert!(cmd.carries_frame());

        assert!(Command::Play.carries_frame());
        assert!(!Command::QueryBattery.carries_frame());
    }

    #[test]
    fn test_range_violation_message() {
        let err = ChirpParams::new(9, 440, 100, 1_000).unwrap_err();
        assert_eq!(
            err.to_string(),
            "start_freq_hz = 9 outside allowed range [10, 15000]"
        );
    }
}
