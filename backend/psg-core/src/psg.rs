//! SN76489 programmable sound generator, as found in the Master System and Game Gear.
//!
//! Three square wave tone channels and one noise channel, each with a 4-bit attenuation register.
//! The chip is clocked once per host clock pulse and runs one internal tick every 16 pulses.

mod registers;

pub use registers::{NoiseRate, RegisterWrite, StereoPanning};

use psgsync_common::GetBit;
use psgsync_common::sync::{StateCorruption, StateSerializer, SyncError, SyncResult, SyncState};
use registers::{LEFT_KEYS, RIGHT_KEYS};
use std::array;

// Attenuation index to output level; index 15 is silent
const LOG_SCALE: [u8; 16] = [255, 203, 161, 128, 102, 86, 64, 51, 40, 32, 26, 20, 16, 13, 10, 0];

const VOLUME_MULTIPLIER: i32 = 42;

const PSG_DIVIDER: u8 = 16;

// Single bit at position 18
pub const NOISE_SEED: u32 = 0x40000;

const INITIAL_TONE_COUNTER: i32 = 0x1000;
const INITIAL_NOISE_COUNTER: i32 = 0x10;

// Largest value the shift register can hold: the seed, or anything shifted down from it
const NOISE_REGISTER_MAX: u32 = (NOISE_SEED << 1) - 1;

const SECTION: &str = "SN76489";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sn76489TickEffect {
    None,
    Clocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sn76489 {
    volume: [u8; 4],
    tone: [u16; 3],
    channel_select: u8,
    volume_or_tone: bool,
    noise_white: bool,
    noise_rate: NoiseRate,
    noise_shift_register: u32,
    tone_counters: [i32; 3],
    noise_counter: i32,
    tone_phases: [bool; 3],
    noise_bit: bool,
    panning: StereoPanning,
    divider: u8,
    sample_l: i32,
    sample_r: i32,
}

impl Sn76489 {
    #[must_use]
    pub fn new() -> Self {
        let mut psg = Self {
            volume: [0; 4],
            tone: [0; 3],
            channel_select: 0,
            volume_or_tone: false,
            noise_white: false,
            noise_rate: NoiseRate::default(),
            noise_shift_register: NOISE_SEED,
            tone_counters: [0; 3],
            noise_counter: 0,
            tone_phases: [false; 3],
            noise_bit: false,
            panning: StereoPanning::default(),
            divider: 0,
            sample_l: 0,
            sample_r: 0,
        };
        psg.reset();
        psg
    }

    /// Power-on reset. Tone periods, phases, noise mode, and the clock divider are left as they
    /// were.
    pub fn reset(&mut self) {
        self.tone_counters = [INITIAL_TONE_COUNTER; 3];
        self.noise_counter = INITIAL_NOISE_COUNTER;
        self.channel_select = 0;
        self.noise_shift_register = NOISE_SEED;
        self.volume = [0x0F; 4];
        self.panning = StereoPanning::default();
    }

    pub fn write(&mut self, value: u8) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("PSG write {value:02X}");
        }

        let write = RegisterWrite(value);
        if write.is_latch() {
            self.channel_select = write.channel();
            self.volume_or_tone = write.selects_volume();
        }

        let channel = usize::from(self.channel_select);
        if self.volume_or_tone {
            self.volume[channel] = write.low_nibble();
        } else if channel == 3 {
            self.noise_white = write.noise_white();
            self.noise_rate = write.noise_rate();
            self.noise_shift_register = NOISE_SEED;
        } else if write.is_latch() {
            self.tone[channel] = (self.tone[channel] & 0x3F0) | u16::from(write.low_nibble());
        } else {
            self.tone[channel] =
                (self.tone[channel] & 0x00F) | (u16::from(write.high_tone_bits()) << 4);
        }
    }

    /// The PSG has no readable registers; the data bus floats high.
    #[inline]
    #[must_use]
    pub fn read(&self) -> u8 {
        0xFF
    }

    pub fn write_stereo_panning(&mut self, value: u8) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("PSG stereo panning write {value:02X}");
        }

        self.panning = StereoPanning::new(value);
    }

    /// Advance by one host clock pulse. Returns [`Sn76489TickEffect::Clocked`] when the pulse completed
    /// an internal tick, in which case [`Self::sample`] holds a newly mixed sample.
    pub fn tick(&mut self) -> Sn76489TickEffect {
        self.divider += 1;
        if self.divider < PSG_DIVIDER {
            return Sn76489TickEffect::None;
        }
        self.divider = 0;

        for counter in &mut self.tone_counters {
            *counter -= 1;
        }
        self.noise_counter -= 1;

        if self.noise_counter == 0 {
            self.clock_noise();
        }

        for channel in 0..3 {
            if self.tone_counters[channel] == 0 {
                self.tone_phases[channel] = !self.tone_phases[channel];
                self.tone_counters[channel] = i32::from(self.tone[channel]) + 1;
            }
        }

        self.mix();

        Sn76489TickEffect::Clocked
    }

    fn clock_noise(&mut self) {
        let register = self.noise_shift_register;
        self.noise_bit = register.bit(0);

        let feedback =
            if self.noise_white { register.bit(0) ^ register.bit(1) } else { register.bit(0) };
        self.noise_shift_register = (u32::from(feedback) << 14) | (register >> 1);

        self.noise_counter = 2 * self.noise_rate.reload(self.tone[2]);
    }

    fn mix(&mut self) {
        let outputs: [i32; 4] = array::from_fn(|channel| {
            let high = if channel == 3 { self.noise_bit } else { self.tone_phases[channel] };
            if high { channel_level(self.volume[channel]) } else { 0 }
        });

        let panning = self.panning;
        self.sample_l =
            (0..4).filter(|&channel| panning.left(channel)).map(|channel| outputs[channel]).sum();
        self.sample_r =
            (0..4).filter(|&channel| panning.right(channel)).map(|channel| outputs[channel]).sum();
    }

    /// Most recently mixed `(left, right)` sample.
    #[inline]
    #[must_use]
    pub fn sample(&self) -> (i32, i32) {
        (self.sample_l, self.sample_r)
    }

    #[inline]
    #[must_use]
    pub fn volume(&self, channel: usize) -> u8 {
        self.volume[channel]
    }

    #[inline]
    #[must_use]
    pub fn tone(&self, channel: usize) -> u16 {
        self.tone[channel]
    }

    #[inline]
    #[must_use]
    pub fn tone_phase(&self, channel: usize) -> bool {
        self.tone_phases[channel]
    }

    #[inline]
    #[must_use]
    pub fn channel_select(&self) -> u8 {
        self.channel_select
    }

    #[inline]
    #[must_use]
    pub fn noise_bit(&self) -> bool {
        self.noise_bit
    }

    #[inline]
    #[must_use]
    pub fn noise_shift_register(&self) -> u32 {
        self.noise_shift_register
    }

    #[inline]
    #[must_use]
    pub fn noise_rate(&self) -> NoiseRate {
        self.noise_rate
    }

    #[inline]
    #[must_use]
    pub fn noise_white(&self) -> bool {
        self.noise_white
    }

    #[inline]
    #[must_use]
    pub fn stereo_panning(&self) -> StereoPanning {
        self.panning
    }

    fn validate_loaded(&mut self) -> SyncResult<()> {
        check_max("channel_select", self.channel_select, 3)?;
        check_max("divider", self.divider, PSG_DIVIDER - 1)?;
        check_max("noise_shift_register", self.noise_shift_register, NOISE_REGISTER_MAX)?;
        for &volume in &self.volume {
            check_max("volume", volume, 0x0F)?;
        }
        for &tone in &self.tone {
            check_max("tone", tone, 0x3FF)?;
        }
        for &counter in self.tone_counters.iter().chain([&self.noise_counter]) {
            if counter < 1 {
                return Err(invalid("counters", counter));
            }
        }

        if self.noise_shift_register == 0 {
            log::warn!(
                "Loaded PSG state has a zero noise shift register; reseeding to {NOISE_SEED:05X}"
            );
            self.noise_shift_register = NOISE_SEED;
        }

        Ok(())
    }
}

impl Default for Sn76489 {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState for Sn76489 {
    fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
        serializer.begin_section(SECTION)?;

        serializer.sync_array("volume", &mut self.volume, false)?;
        serializer.sync_array("tone", &mut self.tone, true)?;
        serializer.sync("channel_select", &mut self.channel_select)?;
        serializer.sync("volume_or_tone", &mut self.volume_or_tone)?;
        serializer.sync("noise_white", &mut self.noise_white)?;

        let mut noise_rate = self.noise_rate.to_bits();
        serializer.sync("noise_rate", &mut noise_rate)?;
        if noise_rate > 0x03 {
            return Err(invalid("noise_rate", noise_rate));
        }
        self.noise_rate = NoiseRate::from_bits(noise_rate);

        serializer.sync_array("tone_counters", &mut self.tone_counters, true)?;
        serializer.sync("noise_counter", &mut self.noise_counter)?;
        serializer.sync("noise_bit", &mut self.noise_bit)?;
        serializer.sync("divider", &mut self.divider)?;
        serializer.sync_array("tone_phases", &mut self.tone_phases, true)?;
        serializer.sync("noise_shift_register", &mut self.noise_shift_register)?;

        for (key, flag) in LEFT_KEYS.into_iter().zip(&mut self.panning.left) {
            serializer.sync(key, flag)?;
        }
        for (key, flag) in RIGHT_KEYS.into_iter().zip(&mut self.panning.right) {
            serializer.sync(key, flag)?;
        }

        serializer.sync("sample_l", &mut self.sample_l)?;
        serializer.sync("sample_r", &mut self.sample_r)?;

        let mut panning_raw = self.panning.raw();
        serializer.sync("stereo_panning", &mut panning_raw)?;
        self.panning.set_raw(panning_raw);

        serializer.end_section()?;

        if serializer.is_loading() {
            self.validate_loaded()?;
        }

        Ok(())
    }
}

fn channel_level(volume: u8) -> i32 {
    i32::from(LOG_SCALE[usize::from(volume & 0x0F)]) * VOLUME_MULTIPLIER
}

fn invalid(name: &str, value: impl ToString) -> SyncError {
    StateCorruption::InvalidValue { name: name.into(), value: value.to_string() }.into()
}

fn check_max<T: PartialOrd + ToString>(name: &str, value: T, max: T) -> SyncResult<()> {
    if value > max { Err(invalid(name, value)) } else { Ok(()) }
}
