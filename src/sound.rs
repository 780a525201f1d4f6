use crate::error::AudioLoadError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::bounded;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Anything that can start the key-press sound without waiting for it.
pub trait Playback: Send + Sync {
    fn play(&self);
}

/// Decoded audio, interleaved f32 in `[-1, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl SoundClip {
    pub fn from_wav(path: &Path) -> Result<Self, AudioLoadError> {
        let reader = hound::WavReader::open(path).map_err(|source| AudioLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let spec = reader.spec();
        let decode_err = |source| AudioLoadError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                // Normalize signed integers of any width to [-1, 1)
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        if samples.is_empty() || spec.channels == 0 {
            return Err(AudioLoadError::Empty(path.to_path_buf()));
        }

        Ok(SoundClip {
            samples,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Re-shape the clip for an output device.
    pub fn convert(&self, channels: u16, sample_rate: u32) -> SoundClip {
        let remixed = remix(&self.samples, self.channels, channels);
        let resampled = resample(&remixed, channels, self.sample_rate, sample_rate);
        SoundClip {
            samples: resampled,
            channels,
            sample_rate,
        }
    }
}

fn remix(input: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return input.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let mut output = Vec::with_capacity(input.len() / from * to);

    for frame in input.chunks_exact(from) {
        // Average to mono, then spread across the output channels
        let mono = frame.iter().sum::<f32>() / from as f32;
        output.extend(std::iter::repeat(mono).take(to));
    }

    output
}

// Linear interpolation resampling on interleaved frames
fn resample(input: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || input.len() < channels {
        return input.to_vec();
    }

    let input_frames = input.len() / channels;
    let ratio = from_rate as f64 / to_rate as f64;
    let output_frames = (input_frames as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let src_pos = i as f64 * ratio;
        let floor = (src_pos.floor() as usize).min(input_frames - 1);
        let ceil = (floor + 1).min(input_frames - 1);
        let frac = (src_pos - floor as f64) as f32;

        for c in 0..channels {
            let a = input[floor * channels + c];
            let b = input[ceil * channels + c];
            output.push(a * (1.0 - frac) + b * frac);
        }
    }

    output
}

/// Sums every active playback of the clip into the output buffer.
///
/// Each voice is a cursor into the shared clip; voices are dropped once they
/// reach the end.
#[derive(Debug)]
pub struct Mixer {
    clip: Arc<[f32]>,
    voices: Vec<usize>,
}

impl Mixer {
    pub fn new(clip: Vec<f32>) -> Self {
        Mixer {
            clip: clip.into(),
            voices: Vec::new(),
        }
    }

    pub fn add_voice(&mut self) {
        if !self.clip.is_empty() {
            self.voices.push(0);
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        out.iter_mut().for_each(|s| *s = 0.0);

        let clip = &self.clip;
        for cursor in self.voices.iter_mut() {
            let n = out.len().min(clip.len() - *cursor);
            for (o, s) in out[..n].iter_mut().zip(&clip[*cursor..*cursor + n]) {
                *o += *s;
            }
            *cursor += n;
        }
        self.voices.retain(|&cursor| cursor < clip.len());

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}

fn lock_mixer(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The loaded key-press sound plus a running output stream.
///
/// The `cpal` stream lives on a dedicated `sound-output` thread for the
/// lifetime of the player; dropping the player ends that thread.
pub struct SoundPlayer {
    mixer: Arc<Mutex<Mixer>>,
    clip_duration: Duration,
    _shutdown: crossbeam_channel::Sender<()>,
}

impl SoundPlayer {
    pub fn load(path: &Path) -> Result<Self, AudioLoadError> {
        let clip = SoundClip::from_wav(path)?;
        let clip_duration = clip.duration();
        info!(
            path = %path.display(),
            channels = clip.channels,
            sample_rate = clip.sample_rate,
            "sound clip loaded ({:.2}s)",
            clip_duration.as_secs_f32()
        );

        let (ready_tx, ready_rx) = bounded::<Result<Arc<Mutex<Mixer>>, AudioLoadError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        thread::Builder::new()
            .name("sound-output".into())
            .spawn(move || {
                let stream = match open_output(&clip) {
                    Ok((stream, mixer)) => {
                        let _ = ready_tx.send(Ok(mixer));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until the player is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioLoadError::Stream(e.to_string()))?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| AudioLoadError::Stream("audio thread exited during setup".to_string()))??;

        Ok(SoundPlayer {
            mixer,
            clip_duration,
            _shutdown: shutdown_tx,
        })
    }

    /// Play once and wait until the clip has finished.
    pub fn play_blocking(&self) {
        self.play();
        let deadline = Instant::now() + self.clip_duration + Duration::from_millis(500);
        while Instant::now() < deadline {
            if lock_mixer(&self.mixer).active_voices() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Playback for SoundPlayer {
    fn play(&self) {
        lock_mixer(&self.mixer).add_voice();
    }
}

fn open_output(clip: &SoundClip) -> Result<(Stream, Arc<Mutex<Mixer>>), AudioLoadError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioLoadError::NoDevice)?;

    if let Ok(name) = device.name() {
        info!("using audio output device: {}", name);
    }

    let supported = device
        .default_output_config()
        .map_err(|e| AudioLoadError::Device(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let prepared = clip.convert(config.channels, config.sample_rate.0);
    let mixer = Arc::new(Mutex::new(Mixer::new(prepared.samples)));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&mixer))?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&mixer))?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&mixer))?,
        other => {
            return Err(AudioLoadError::Device(format!(
                "unsupported output sample format {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioLoadError::Stream(e.to_string()))?;

    Ok((stream, mixer))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<Stream, AudioLoadError>
where
    T: SizedSample + FromSample<f32>,
{
    let err_fn = |err: cpal::StreamError| error!("audio stream error: {}", err);
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                lock_mixer(&mixer).fill(&mut scratch);
                for (out, s) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*s);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioLoadError::Stream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_wav(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be set")
            .as_nanos();
        std::env::temp_dir().join(format!("lizard-sound-{name}-{nanos}.wav"))
    }

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_int_wav() {
        let path = temp_wav("int");
        write_wav(&path, 2, &[16384, -16384, 0, 32767]);

        let clip = SoundClip::from_wav(&path).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.frames(), 2);
        assert!((clip.samples[0] - 0.5).abs() < 1e-6);
        assert!((clip.samples[1] + 0.5).abs() < 1e-6);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = SoundClip::from_wav(Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(AudioLoadError::Open { .. })));
    }

    #[test]
    fn test_garbage_file_is_load_error() {
        let path = temp_wav("garbage");
        std::fs::write(&path, b"this is not a wav file").unwrap();

        assert!(SoundClip::from_wav(&path).is_err());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_empty_wav_is_rejected() {
        let path = temp_wav("empty");
        write_wav(&path, 1, &[]);

        assert!(matches!(SoundClip::from_wav(&path), Err(AudioLoadError::Empty(_))));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_mono_to_stereo() {
        let clip = SoundClip {
            samples: vec![0.1, 0.2],
            channels: 1,
            sample_rate: 100,
        };
        let converted = clip.convert(2, 100);
        assert_eq!(converted.samples, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_upsample_doubles_frames() {
        let clip = SoundClip {
            samples: vec![0.0, 1.0, 0.0, 1.0],
            channels: 1,
            sample_rate: 100,
        };
        let converted = clip.convert(1, 200);
        assert_eq!(converted.frames(), 8);
        assert!((converted.samples[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_voices_are_mixed_and_clamped() {
        let mut mixer = Mixer::new(vec![0.6, 0.6, 0.6]);
        mixer.add_voice();

        let mut out = [0.0f32; 2];
        mixer.fill(&mut out);
        assert_eq!(out, [0.6, 0.6]);

        // Second trigger while the first is still sounding
        mixer.add_voice();
        mixer.fill(&mut out);
        assert_eq!(out, [1.0, 0.6]);
        assert_eq!(mixer.active_voices(), 1);

        mixer.fill(&mut out);
        assert_eq!(out, [0.6, 0.0]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_idle_mixer_outputs_silence() {
        let mut mixer = Mixer::new(vec![0.5; 4]);
        let mut out = [0.3f32; 3];
        mixer.fill(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }
}
