//! CPAL audio output

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, SupportedStreamConfig};

use crate::error::{Result, SynthError};
use crate::synth::Synth;

/// Renders a [`Synth`] straight from a CPAL output callback.
///
/// The stream lives on its own thread; dropping the sink stops it.
pub struct CpalSink {
    frames_rendered: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    channels: usize,
}

impl CpalSink {
    pub fn start(device: &cpal::Device, config: &SupportedStreamConfig, synth: Synth) -> Result<Self> {
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();

        if stream_config.sample_rate.0 != synth.sample_rate() {
            tracing::warn!(
                device = stream_config.sample_rate.0,
                synth = synth.sample_rate(),
                "sample rate mismatch; pitch will be off"
            );
        }

        let frames_rendered = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let device = device.clone();
        let frames = Arc::clone(&frames_rendered);
        let stopped = Arc::clone(&stop);
        let thread = std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_format, &stream_config, synth, frames) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(SynthError::Device(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep thread alive - stream lives as long as this thread
            while !stopped.load(Ordering::Acquire) {
                std::thread::park();
            }
        });

        ready_rx
            .recv()
            .map_err(|_| SynthError::Device("stream thread exited".into()))??;

        tracing::info!(channels, ?sample_format, "output stream started");
        Ok(Self {
            frames_rendered,
            stop,
            thread: Some(thread),
            channels,
        })
    }

    /// Frames handed to the device so far.
    #[inline]
    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    synth: Synth,
    frames: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::F32 => build_typed::<f32>(device, stream_config, synth, frames),
        SampleFormat::I16 => build_typed::<i16>(device, stream_config, synth, frames),
        SampleFormat::U16 => build_typed::<u16>(device, stream_config, synth, frames),
        other => Err(SynthError::Device(format!("unsupported sample format {other:?}"))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut synth: Synth,
    frames: Arc<AtomicUsize>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(stream_config.channels).max(1);
    // a few blocks per callback before we loop
    let scratch = synth.buffer_size() * 4;
    let mut left = vec![0.0f32; scratch];
    let mut right = vec![0.0f32; scratch];

    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(scratch * channels) {
                    let n = chunk.len() / channels;
                    synth.process(&[], &mut left[..n], &mut right[..n]);
                    for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            let value = match ch {
                                0 => left[i],
                                1 => right[i],
                                _ => 0.0,
                            };
                            *sample = T::from_sample(value);
                        }
                    }
                    frames.fetch_add(n, Ordering::Relaxed);
                }
            },
            |err| tracing::error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| SynthError::Device(e.to_string()))
}
