//! Host core public interface: a PSG sub-core plus frame, lag, and reset bookkeeping

use crate::psg::{Sn76489, Sn76489TickEffect};
use psg_config::{HostConfig, StateFormat};
use psgsync_common::frontend::{AudioOutput, TickEffect};
use psgsync_common::sync::{self, StateCorruption, SyncResult};
use psgsync_proc_macros::SyncState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError<AErr> {
    #[error("Audio output error: {0}")]
    Audio(AErr),
}

pub type HostResult<AErr> = Result<TickEffect, HostError<AErr>>;

/// Sub-core that owns the PSG and forwards every mixed sample to an audio sink.
#[derive(Debug, Clone, PartialEq, Eq, SyncState)]
#[sync(section = "PsgCore")]
pub struct PsgCore {
    #[sync(nested)]
    psg: Sn76489,
    // Host clock pulses executed, wrapping
    cycle_count: u32,
    // Mixed samples produced, wrapping
    sample_count: u32,
}

impl PsgCore {
    #[must_use]
    pub fn new() -> Self {
        Self { psg: Sn76489::new(), cycle_count: 0, sample_count: 0 }
    }

    #[inline]
    #[must_use]
    pub fn psg(&self) -> &Sn76489 {
        &self.psg
    }

    #[inline]
    #[must_use]
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn write_psg(&mut self, value: u8) {
        self.psg.write(value);
    }

    pub fn write_panning(&mut self, value: u8) {
        self.psg.write_stereo_panning(value);
    }

    #[must_use]
    pub fn read_psg(&self) -> u8 {
        self.psg.read()
    }

    pub fn reset(&mut self) {
        self.psg.reset();
    }

    /// Run the PSG for one host clock pulse.
    ///
    /// # Errors
    ///
    /// Propagates any error from the audio sink.
    #[inline]
    pub fn tick<A: AudioOutput>(&mut self, audio_output: &mut A) -> Result<(), A::Err> {
        self.cycle_count = self.cycle_count.wrapping_add(1);

        if self.psg.tick() == Sn76489TickEffect::Clocked {
            self.sample_count = self.sample_count.wrapping_add(1);
            let (sample_l, sample_r) = self.psg.sample();
            audio_output.push_sample(sample_l, sample_r)?;
        }

        Ok(())
    }
}

impl Default for PsgCore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsgPort {
    Data,
    StereoPanning,
}

/// A register write applied immediately before the host clock pulse at `cycle` within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedWrite {
    pub cycle: u32,
    pub port: PsgPort,
    pub value: u8,
}

/// Host core: owns the PSG sub-core and tracks frames, lag frames, and scheduled resets.
///
/// The sub-core is persisted first, then the host's own fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, SyncState)]
pub struct HostCore {
    #[sync(nested)]
    core: PsgCore,
    lag_count: i32,
    frame: i32,
    is_lag: bool,
    // Set by any register write during the current frame
    pass_new_input: bool,
    reset_pending: bool,
    reset_cycle: u32,
    current_cycle: u32,
    vblank_count: u32,
    #[sync(skip)]
    config: HostConfig,
}

impl HostCore {
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        log::info!(
            "Creating host core with {} timing ({} cycles per frame)",
            config.timing_mode,
            config.cycles_per_frame()
        );

        Self {
            core: PsgCore::new(),
            lag_count: 0,
            frame: 0,
            is_lag: false,
            pass_new_input: false,
            reset_pending: false,
            reset_cycle: 0,
            current_cycle: 0,
            vblank_count: 0,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn core(&self) -> &PsgCore {
        &self.core
    }

    #[inline]
    #[must_use]
    pub fn psg(&self) -> &Sn76489 {
        self.core.psg()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> HostConfig {
        self.config
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> i32 {
        self.frame
    }

    #[inline]
    #[must_use]
    pub fn lag_count(&self) -> i32 {
        self.lag_count
    }

    #[inline]
    #[must_use]
    pub fn is_lag(&self) -> bool {
        self.is_lag
    }

    #[inline]
    #[must_use]
    pub fn current_cycle(&self) -> u32 {
        self.current_cycle
    }

    #[inline]
    #[must_use]
    pub fn vblank_count(&self) -> u32 {
        self.vblank_count
    }

    #[inline]
    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn write_psg(&mut self, value: u8) {
        self.core.write_psg(value);
        self.pass_new_input = true;
    }

    pub fn write_panning(&mut self, value: u8) {
        self.core.write_panning(value);
        self.pass_new_input = true;
    }

    #[must_use]
    pub fn read_psg(&self) -> u8 {
        self.core.read_psg()
    }

    /// Schedule a PSG power-on reset before the host clock pulse at `cycle` in the current frame.
    /// Cycles past the end of the frame are clamped to the last cycle. If `cycle` has already
    /// passed, the reset happens at that cycle in the next frame.
    pub fn schedule_reset(&mut self, cycle: u32) {
        self.reset_pending = true;
        self.reset_cycle = self.clamp_cycle(cycle);
    }

    fn clamp_cycle(&self, cycle: u32) -> u32 {
        cycle.min(self.config.cycles_per_frame() - 1)
    }

    /// Run up to `cycles` host clock pulses, stopping early at the end of a frame.
    ///
    /// # Errors
    ///
    /// Propagates any error from the audio sink.
    pub fn run_cycles<A: AudioOutput>(
        &mut self,
        cycles: u32,
        audio_output: &mut A,
    ) -> HostResult<A::Err> {
        for _ in 0..cycles {
            if self.reset_pending && self.current_cycle == self.reset_cycle {
                log::info!("Resetting PSG at frame {} cycle {}", self.frame, self.current_cycle);
                self.reset_pending = false;
                self.core.reset();
            }

            self.core.tick(audio_output).map_err(HostError::Audio)?;

            self.current_cycle += 1;
            if self.current_cycle >= self.config.cycles_per_frame() {
                self.end_frame();
                return Ok(TickEffect::FrameComplete);
            }
        }

        Ok(TickEffect::None)
    }

    /// Run until the end of the current frame, applying `writes` as their cycles are reached.
    ///
    /// Writes should be sorted by cycle. A write whose cycle has already passed is applied
    /// immediately, and cycles past the end of the frame are clamped to the last cycle.
    ///
    /// # Errors
    ///
    /// Propagates any error from the audio sink.
    pub fn run_frame<A: AudioOutput>(
        &mut self,
        writes: &[TimedWrite],
        audio_output: &mut A,
    ) -> HostResult<A::Err> {
        let mut writes = writes.iter().copied().peekable();
        loop {
            while let Some(write) =
                writes.next_if(|write| self.clamp_cycle(write.cycle) <= self.current_cycle)
            {
                match write.port {
                    PsgPort::Data => self.write_psg(write.value),
                    PsgPort::StereoPanning => self.write_panning(write.value),
                }
            }

            let run_until = writes
                .peek()
                .map_or(self.config.cycles_per_frame(), |write| self.clamp_cycle(write.cycle));
            if self.run_cycles(run_until - self.current_cycle, audio_output)?
                == TickEffect::FrameComplete
            {
                return Ok(TickEffect::FrameComplete);
            }
        }
    }

    fn end_frame(&mut self) {
        self.current_cycle = 0;
        self.frame = self.frame.wrapping_add(1);
        self.vblank_count = self.vblank_count.wrapping_add(1);

        self.is_lag = self.config.lag_on_empty_frame && !self.pass_new_input;
        if self.is_lag {
            self.lag_count = self.lag_count.wrapping_add(1);
        }
        self.pass_new_input = false;
    }

    /// Replace everything except the configuration with power-on state.
    pub fn hard_reset(&mut self) {
        log::info!("Hard resetting host core");

        *self = Self::new(self.config);
    }

    pub fn reload_config(&mut self, config: HostConfig) {
        self.config = config;
        self.current_cycle = self.clamp_cycle(self.current_cycle);
        self.reset_cycle = self.clamp_cycle(self.reset_cycle);
    }

    /// Save the full host state.
    ///
    /// # Errors
    ///
    /// Propagates encoding errors from the serializer.
    pub fn save_state(&self, format: StateFormat) -> SyncResult<Vec<u8>> {
        // Traversal takes &mut self for loading; save from a copy
        let mut snapshot = self.clone();
        let bytes = match format {
            StateFormat::Binary => sync::save_binary(&mut snapshot)?,
            StateFormat::Text => sync::save_text(&mut snapshot)?.into_bytes(),
        };

        log::info!("Saved {format} state at frame {} ({} bytes)", self.frame, bytes.len());

        Ok(bytes)
    }

    /// Load a state produced by [`Self::save_state`]. The configuration is kept.
    ///
    /// The load is staged in a copy; on error `self` is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption`] if the data does not describe a valid state.
    pub fn load_state(&mut self, format: StateFormat, data: &[u8]) -> SyncResult<()> {
        let mut staged = self.clone();
        match format {
            StateFormat::Binary => sync::load_binary(&mut staged, data)?,
            StateFormat::Text => {
                let text = std::str::from_utf8(data).map_err(|err| StateCorruption::Malformed {
                    line: 0,
                    message: err.to_string(),
                })?;
                sync::load_text(&mut staged, text)?;
            }
        }

        let frame_len = self.config.cycles_per_frame();
        check_cycle("current_cycle", staged.current_cycle, frame_len)?;
        check_cycle("reset_cycle", staged.reset_cycle, frame_len)?;

        log::info!("Loaded {format} state at frame {} ({} bytes)", staged.frame, data.len());

        *self = staged;
        Ok(())
    }
}

fn check_cycle(name: &str, cycle: u32, frame_len: u32) -> Result<(), StateCorruption> {
    if cycle < frame_len {
        Ok(())
    } else {
        Err(StateCorruption::InvalidValue { name: name.into(), value: cycle.to_string() })
    }
}
