use psgsync_common::GetBit;

/// A byte written to the PSG data port.
///
/// Latch bytes (bit 7 set) select a channel and register; data bytes (bit 7 clear) update the
/// register selected by the most recent latch byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite(pub u8);

impl RegisterWrite {
    #[inline]
    #[must_use]
    pub fn is_latch(self) -> bool {
        self.0.bit(7)
    }

    /// Bits 6-5 of a latch byte
    #[inline]
    #[must_use]
    pub fn channel(self) -> u8 {
        self.0.bits(5..=6)
    }

    /// Bit 4 of a latch byte; set selects the volume register, clear selects tone/noise control
    #[inline]
    #[must_use]
    pub fn selects_volume(self) -> bool {
        self.0.bit(4)
    }

    #[inline]
    #[must_use]
    pub fn low_nibble(self) -> u8 {
        self.0.bits(0..=3)
    }

    /// Bits 5-0 of a data byte, the high 6 bits of a 10-bit tone period
    #[inline]
    #[must_use]
    pub fn high_tone_bits(self) -> u8 {
        self.0.bits(0..=5)
    }

    #[inline]
    #[must_use]
    pub fn noise_white(self) -> bool {
        self.0.bit(2)
    }

    #[inline]
    #[must_use]
    pub fn noise_rate(self) -> NoiseRate {
        NoiseRate::from_bits(self.0)
    }
}

/// Noise counter reload source, from the low 2 bits of the noise control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseRate {
    #[default]
    Div16,
    Div32,
    Div64,
    Tone2,
}

impl NoiseRate {
    #[must_use]
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0x00 => Self::Div16,
            0x01 => Self::Div32,
            0x02 => Self::Div64,
            0x03 => Self::Tone2,
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        }
    }

    #[must_use]
    pub fn to_bits(self) -> u8 {
        match self {
            Self::Div16 => 0x00,
            Self::Div32 => 0x01,
            Self::Div64 => 0x02,
            Self::Tone2 => 0x03,
        }
    }

    /// Counter reload in internal ticks, before the noise channel's doubling.
    #[must_use]
    pub fn reload(self, tone2: u16) -> i32 {
        match self {
            Self::Div16 => 0x10,
            Self::Div32 => 0x20,
            Self::Div64 => 0x40,
            Self::Tone2 => i32::from(tone2) + 1,
        }
    }
}

pub(crate) const LEFT_KEYS: [&str; 4] = ["A_L", "B_L", "C_L", "noise_L"];
pub(crate) const RIGHT_KEYS: [&str; 4] = ["A_R", "B_R", "C_R", "noise_R"];

/// Stereo panning register (Game Gear port 0x06).
///
/// Bits 0-3 enable tone A, tone B, tone C, and noise on the right side; bits 4-7 enable the same
/// channels on the left side. The decoded flags are kept alongside the last written byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoPanning {
    pub(crate) left: [bool; 4],
    pub(crate) right: [bool; 4],
    raw: u8,
}

impl StereoPanning {
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self {
            left: std::array::from_fn(|channel| value.bit(4 + channel as u8)),
            right: std::array::from_fn(|channel| value.bit(channel as u8)),
            raw: value,
        }
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u8 {
        self.raw
    }

    /// Channels 0-2 are tone A-C, channel 3 is noise
    #[inline]
    #[must_use]
    pub fn left(self, channel: usize) -> bool {
        self.left[channel]
    }

    #[inline]
    #[must_use]
    pub fn right(self, channel: usize) -> bool {
        self.right[channel]
    }

    pub(crate) fn set_raw(&mut self, raw: u8) {
        self.raw = raw;
    }
}

impl Default for StereoPanning {
    fn default() -> Self {
        Self::new(0xFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_byte_fields() {
        let write = RegisterWrite(0b1101_0110);
        assert!(write.is_latch());
        assert_eq!(write.channel(), 2);
        assert!(write.selects_volume());
        assert_eq!(write.low_nibble(), 0x6);

        let write = RegisterWrite(0b1110_0111);
        assert_eq!(write.channel(), 3);
        assert!(!write.selects_volume());
        assert!(write.noise_white());
        assert_eq!(write.noise_rate(), NoiseRate::Tone2);
    }

    #[test]
    fn data_byte_fields() {
        let write = RegisterWrite(0x3F);
        assert!(!write.is_latch());
        assert_eq!(write.high_tone_bits(), 0x3F);
        assert_eq!(RegisterWrite(0x7F).high_tone_bits(), 0x3F);
    }

    #[test]
    fn noise_rate_reload() {
        assert_eq!(NoiseRate::from_bits(0xF0).reload(0), 0x10);
        assert_eq!(NoiseRate::Div64.reload(0x3FF), 0x40);
        assert_eq!(NoiseRate::Tone2.reload(0x3FF), 0x400);
        assert_eq!(NoiseRate::from_bits(NoiseRate::Div32.to_bits()), NoiseRate::Div32);
    }

    #[test]
    fn panning_bit_layout() {
        let panning = StereoPanning::new(0b1010_0101);
        assert_eq!(panning.raw(), 0xA5);
        // Right: A, C
        assert_eq!(panning.right, [true, false, true, false]);
        // Left: B, noise
        assert_eq!(panning.left, [false, true, false, true]);
        assert_eq!(StereoPanning::default().left, [true; 4]);
    }
}
