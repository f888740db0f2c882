//! Tone plans - what each cue sounds like
//!
//! Each cue is a short list of scheduled tones. Rendering is deterministic
//! and allocation happens once per cue, so a sink can pre-render every cue at
//! startup and play buffers on demand.

use std::f32::consts::PI;
use std::path::Path;

use anyhow::{Context, Result};

use super::Cue;

/// Floor the envelopes decay towards (matches a -60 dB tail).
const ENVELOPE_FLOOR: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
}

/// One scheduled oscillator burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub duration_ms: f32,
    /// Start relative to the cue trigger
    pub offset_ms: f32,
    pub gain: f32,
}

impl Tone {
    const fn new(
        waveform: Waveform,
        frequency_hz: f32,
        duration_ms: f32,
        offset_ms: f32,
        gain: f32,
    ) -> Self {
        Self {
            waveform,
            frequency_hz,
            duration_ms,
            offset_ms,
            gain,
        }
    }

    fn end_ms(&self) -> f32 {
        self.offset_ms + self.duration_ms
    }
}

/// Tones making up `cue`.
pub fn tone_plan(cue: Cue) -> Vec<Tone> {
    use Waveform::*;

    match cue {
        // Ascending three-tone burst
        Cue::RoundStart => [440.0, 660.0, 880.0]
            .iter()
            .enumerate()
            .map(|(i, &freq)| Tone::new(Sine, freq, 120.0, i as f32 * 120.0, 0.4))
            .collect(),
        Cue::OneMinuteWarning => vec![Tone::new(Sine, 880.0, 300.0, 0.0, 0.4)],
        Cue::FiveSecondWarning => vec![
            Tone::new(Sine, 600.0, 100.0, 0.0, 0.6),
            Tone::new(Sine, 900.0, 100.0, 120.0, 0.8),
        ],
        // Gets louder as the count approaches zero
        Cue::LastSeconds(secs) => {
            let gain = 0.4 + (10.0 - secs.min(10) as f32) * 0.06;
            vec![Tone::new(Sine, 880.0, 80.0, 0.0, gain)]
        }
        // Four rapid clicks, then a buzz
        Cue::RoundEnd => {
            let mut tones: Vec<Tone> = [0.0, 80.0, 160.0, 240.0]
                .iter()
                .map(|&offset| Tone::new(Square, 1000.0, 20.0, offset, 0.9))
                .collect();
            tones.push(Tone::new(Sawtooth, 180.0, 700.0, 380.0, 0.7));
            tones
        }
    }
}

/// Synthesize `cue` as mono f32 samples in [-1.0, 1.0].
///
/// Sine and square tones decay exponentially to the envelope floor; the
/// sawtooth buzz fades linearly.
pub fn render_cue(cue: Cue, sample_rate: u32) -> Vec<f32> {
    let plan = tone_plan(cue);
    let sr = sample_rate as f32;
    let total_ms = plan.iter().map(Tone::end_ms).fold(0.0_f32, f32::max);
    let mut buffer = vec![0.0_f32; (total_ms * sr / 1000.0).ceil() as usize];

    for tone in &plan {
        let start = (tone.offset_ms * sr / 1000.0) as usize;
        let len = (tone.duration_ms * sr / 1000.0) as usize;
        for i in 0..len {
            let Some(slot) = buffer.get_mut(start + i) else {
                break;
            };
            let t = i as f32 / sr;
            let progress = i as f32 / len as f32;
            *slot += oscillator(tone.waveform, tone.frequency_hz * t) * envelope(tone, progress);
        }
    }

    for sample in &mut buffer {
        *sample = sample.clamp(-1.0, 1.0);
    }
    buffer
}

/// Render `cue` and write it as a 32-bit float mono WAV file.
pub fn write_cue_wav(path: &Path, cue: Cue, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for sample in render_cue(cue, sample_rate) {
        writer
            .write_sample(sample)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

/// Oscillator value for `cycles` elapsed periods.
fn oscillator(waveform: Waveform, cycles: f32) -> f32 {
    let frac = cycles.fract();
    match waveform {
        Waveform::Sine => (2.0 * PI * cycles).sin(),
        Waveform::Square => {
            if frac < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * frac - 1.0,
    }
}

fn envelope(tone: &Tone, progress: f32) -> f32 {
    match tone.waveform {
        Waveform::Sawtooth => tone.gain + (ENVELOPE_FLOOR - tone.gain) * progress,
        _ => tone.gain * (ENVELOPE_FLOOR / tone.gain).powf(progress),
    }
}
