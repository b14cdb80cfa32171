use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use log::error;

use super::{analyser::FFT_SIZE, error::MonitorError};

/// Rolling mono window of the newest `FFT_SIZE` input samples.
#[derive(Default)]
pub(crate) struct SampleWindow {
    samples: VecDeque<f32>,
}

impl SampleWindow {
    pub(crate) fn extend(&mut self, samples: impl IntoIterator<Item = f32>) {
        for sample in samples {
            if self.samples.len() == FFT_SIZE {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}

/// Open input stream on the default microphone.
///
/// The device runs with its default configuration; no echo cancellation,
/// noise suppression or gain control is applied, so the window holds the raw
/// ambient signal. Dropping the capture closes the stream and releases the
/// device.
pub(crate) struct InputCapture {
    _stream: Stream,
    window: Arc<Mutex<SampleWindow>>,
}

impl InputCapture {
    pub(crate) fn open() -> Result<Self, MonitorError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(MonitorError::NoMicrophoneFound)?;

        let supported = device
            .default_input_config()
            .map_err(|e| MonitorError::DeviceInitFailed(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let window = Arc::new(Mutex::new(SampleWindow::default()));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&window))?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&window))?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&window))?,
            other => return Err(MonitorError::UnsupportedFormat(format!("{other:?}"))),
        };

        stream
            .play()
            .map_err(|e| MonitorError::StreamStartFailed(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            window,
        })
    }

    pub(crate) fn frame(&self) -> Vec<f32> {
        match self.window.lock() {
            Ok(window) => window.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    window: Arc<Mutex<SampleWindow>>,
) -> Result<Stream, MonitorError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = usize::from(config.channels).max(1);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Downmix interleaved frames to mono by averaging.
                let mono = data.chunks(channels).map(|frame| {
                    frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32
                });
                if let Ok(mut buffer) = window.lock() {
                    buffer.extend(mono);
                }
            },
            |err| error!("Input stream error: {err}"),
            None,
        )
        .map_err(|e| MonitorError::StreamStartFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_only_the_newest_samples() {
        let mut window = SampleWindow::default();
        window.extend((0..FFT_SIZE + 10).map(|i| i as f32));

        let snapshot = window.snapshot();
        assert_eq!(snapshot.len(), FFT_SIZE);
        assert_eq!(snapshot[0], 10.0);
        assert_eq!(snapshot[FFT_SIZE - 1], (FFT_SIZE + 9) as f32);
    }
}
