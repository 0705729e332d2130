use std::convert::Infallible;

pub trait AudioOutput {
    type Err;

    /// Push a stereo audio sample.
    ///
    /// Samples are in the chip's integer output domain; no scaling or resampling is applied.
    ///
    /// # Errors
    ///
    /// This method will return an error if the sink is unable to accept the sample.
    fn push_sample(&mut self, sample_l: i32, sample_r: i32) -> Result<(), Self::Err>;
}

impl AudioOutput for Vec<(i32, i32)> {
    type Err = Infallible;

    fn push_sample(&mut self, sample_l: i32, sample_r: i32) -> Result<(), Self::Err> {
        self.push((sample_l, sample_r));
        Ok(())
    }
}

/// Audio sink that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioOutput;

impl AudioOutput for NullAudioOutput {
    type Err = Infallible;

    fn push_sample(&mut self, _sample_l: i32, _sample_r: i32) -> Result<(), Self::Err> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    None,
    FrameComplete,
}

pub type TickResult<Err> = Result<TickEffect, Err>;
