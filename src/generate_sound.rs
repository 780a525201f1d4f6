use anyhow::{Context, Result};
use std::f32::consts::PI;
use std::fs;
use std::path::Path;

const SAMPLE_RATE: u32 = 44_100;

/// One chirp: a fast downward sweep with a percussive envelope.
fn chirp(samples: &mut Vec<f32>, start_hz: f32, end_hz: f32, duration_s: f32) {
    let count = (SAMPLE_RATE as f32 * duration_s) as usize;
    let mut phase = 0.0f32;

    for i in 0..count {
        let t = i as f32 / count as f32;
        let freq = start_hz + (end_hz - start_hz) * t;
        phase += 2.0 * PI * freq / SAMPLE_RATE as f32;

        // 5ms attack, exponential decay
        let attack = (i as f32 / (SAMPLE_RATE as f32 * 0.005)).min(1.0);
        let decay = (-6.0 * t).exp();
        samples.push(phase.sin() * attack * decay * 0.6);
    }
}

fn silence(samples: &mut Vec<f32>, duration_s: f32) {
    let count = (SAMPLE_RATE as f32 * duration_s) as usize;
    samples.extend(std::iter::repeat(0.0).take(count));
}

fn main() -> Result<()> {
    println!("Generating key-press sound...");

    let out_dir = Path::new("assets").join("sounds");
    fs::create_dir_all(&out_dir).context("Failed to create assets/sounds")?;
    let out_path = out_dir.join("lizard.wav");

    let mut samples = Vec::new();
    chirp(&mut samples, 2400.0, 1600.0, 0.06);
    silence(&mut samples, 0.03);
    chirp(&mut samples, 2600.0, 1400.0, 0.09);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&out_path, spec)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;

    for s in &samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    println!(
        "✅ Sound created: {} ({:.0}ms)",
        out_path.display(),
        samples.len() as f32 * 1000.0 / SAMPLE_RATE as f32
    );

    Ok(())
}
