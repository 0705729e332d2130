use crc::{Crc, Digest};
use psgsync_common::frontend::AudioOutput;
use std::convert::Infallible;
use std::fmt::{self, Display};

static CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Audio sink that reduces the sample stream to a CRC-32 and a peak amplitude.
pub struct DigestAudioOutput {
    digest: Digest<'static, u32>,
    sample_count: u64,
    peak: i32,
}

impl DigestAudioOutput {
    #[must_use]
    pub fn new() -> Self {
        Self { digest: CRC.digest(), sample_count: 0, peak: 0 }
    }

    #[must_use]
    pub fn finish(self) -> AudioSummary {
        AudioSummary {
            crc32: self.digest.finalize(),
            sample_count: self.sample_count,
            peak: self.peak,
        }
    }
}

impl Default for DigestAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for DigestAudioOutput {
    type Err = Infallible;

    fn push_sample(&mut self, sample_l: i32, sample_r: i32) -> Result<(), Self::Err> {
        self.digest.update(&sample_l.to_le_bytes());
        self.digest.update(&sample_r.to_le_bytes());
        self.sample_count += 1;
        self.peak = self.peak.max(sample_l.abs()).max(sample_r.abs());

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSummary {
    pub crc32: u32,
    pub sample_count: u64,
    pub peak: i32,
}

impl Display for AudioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "samples={} crc32={:08X} peak={}", self.sample_count, self.crc32, self.peak)
    }
}
