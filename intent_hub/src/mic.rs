//! Microphone capture via `cpal` (feature `mic`).
//!
//! The stream callback chops incoming samples into fixed-size i16 blocks and
//! sends them over an `mpsc` channel; [`MicSource::read_block`] only ever
//! `try_recv`s, so the engine tick never waits on the sound card.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use tracing::{info, warn};

use intent_core::error::CaptureError;
use intent_core::{AudioSource, Thresholds};

pub struct MicSource {
    _stream:  Stream,
    receiver: Receiver<Vec<i16>>,
}

impl MicSource {
    /// Open input device `index` (the host default when `None`) as mono at
    /// the configured sample rate.
    pub fn open(index: Option<usize>, cfg: &Thresholds) -> Result<Self> {
        let host = cpal::default_host();
        let device = match index {
            Some(i) => host
                .input_devices()
                .context("Failed to list input devices")?
                .nth(i)
                .with_context(|| format!("No input device #{}", i))?,
            None => host
                .default_input_device()
                .context("No input device available")?,
        };
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let rate = SampleRate(cfg.sample_rate);
        let native_i16 = device
            .supported_input_configs()
            .context("Failed to get supported configs")?
            .filter(|c| c.channels() == 1 && c.sample_format() == SampleFormat::I16)
            .find(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .map(|c| c.with_sample_rate(rate).config());

        let (sender, receiver) = mpsc::channel();
        let stream = match native_i16 {
            Some(config) => Self::build_stream_i16(&device, &config, sender, cfg.block_size)?,
            None => {
                // Some devices only offer f32; ask for mono f32 and convert.
                let config = StreamConfig {
                    channels:    1,
                    sample_rate: rate,
                    buffer_size: cpal::BufferSize::Default,
                };
                Self::build_stream_f32(&device, &config, sender, cfg.block_size)?
            }
        };
        stream.play().context("Failed to start audio stream")?;
        info!(device = %name, rate = cfg.sample_rate, block = cfg.block_size, "microphone open");

        Ok(MicSource { _stream: stream, receiver })
    }

    fn build_stream_i16(
        device:     &cpal::Device,
        config:     &StreamConfig,
        sender:     Sender<Vec<i16>>,
        block_size: usize,
    ) -> Result<Stream> {
        let mut chunker = Chunker::new(block_size, sender);
        let stream = device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| chunker.push(data.iter().copied()),
            |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        Ok(stream)
    }

    fn build_stream_f32(
        device:     &cpal::Device,
        config:     &StreamConfig,
        sender:     Sender<Vec<i16>>,
        block_size: usize,
    ) -> Result<Stream> {
        let mut chunker = Chunker::new(block_size, sender);
        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                chunker.push(data.iter().map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16))
            },
            |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        Ok(stream)
    }
}

impl AudioSource for MicSource {
    fn read_block(&mut self) -> Result<Vec<i16>, CaptureError> {
        match self.receiver.try_recv() {
            Ok(block) => Ok(block),
            Err(TryRecvError::Empty) => Err(CaptureError::Timeout),
            Err(TryRecvError::Disconnected) => Err(CaptureError::Disconnected),
        }
    }
}

/// Accumulates callback samples and emits complete blocks.
struct Chunker {
    block_size: usize,
    pending:    Vec<i16>,
    sender:     Sender<Vec<i16>>,
}

impl Chunker {
    fn new(block_size: usize, sender: Sender<Vec<i16>>) -> Self {
        Chunker { block_size, pending: Vec::with_capacity(block_size * 2), sender }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) {
        self.pending.extend(samples);
        while self.pending.len() >= self.block_size {
            let block: Vec<i16> = self.pending.drain(..self.block_size).collect();
            let _ = self.sender.send(block);
        }
    }
}
