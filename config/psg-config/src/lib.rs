use psgsync_proc_macros::{EnumDisplay, EnumFromStr};

// Host (Z80) clock cycles per scanline; the PSG is clocked once per host cycle
pub const CYCLES_PER_SCANLINE: u32 = 228;

pub const NTSC_SCANLINES_PER_FRAME: u32 = 262;
pub const PAL_SCANLINES_PER_FRAME: u32 = 313;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumDisplay, EnumFromStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TimingMode {
    #[default]
    Ntsc,
    Pal,
}

impl TimingMode {
    #[inline]
    #[must_use]
    pub fn cycles_per_frame(self) -> u32 {
        let scanlines = match self {
            Self::Ntsc => NTSC_SCANLINES_PER_FRAME,
            Self::Pal => PAL_SCANLINES_PER_FRAME,
        };
        scanlines * CYCLES_PER_SCANLINE
    }
}

/// Persisted representation used for save states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumDisplay, EnumFromStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum StateFormat {
    #[default]
    Binary,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HostConfig {
    pub timing_mode: TimingMode,
    /// Count frames that received no register writes as lag frames
    pub lag_on_empty_frame: bool,
}

impl HostConfig {
    #[inline]
    #[must_use]
    pub fn cycles_per_frame(&self) -> u32 {
        self.timing_mode.cycles_per_frame()
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { timing_mode: TimingMode::default(), lag_on_empty_frame: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lengths() {
        assert_eq!(TimingMode::Ntsc.cycles_per_frame(), 59_736);
        assert_eq!(TimingMode::Pal.cycles_per_frame(), 71_364);
    }

    #[test]
    fn enum_strings() {
        assert_eq!("pal".parse::<TimingMode>(), Ok(TimingMode::Pal));
        assert_eq!(StateFormat::Text.to_string(), "Text");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn host_config_from_partial_toml() {
        let config: HostConfig = toml::from_str("timing_mode = \"Pal\"").unwrap();
        assert_eq!(config, HostConfig { timing_mode: TimingMode::Pal, lag_on_empty_frame: true });

        let config: HostConfig = toml::from_str("").unwrap();
        assert_eq!(config, HostConfig::default());
    }
}
