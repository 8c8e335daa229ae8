/// Sound engine: procedural cue sounds via rodio.
///
/// Every [`SoundCue`] is rendered once at startup into an in-memory WAV
/// buffer; `play` is fire-and-forget on a detached Sink.
///
/// Build without the "sound" feature to drop audio entirely (the stub
/// engine accepts every cue and does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use log::warn;
    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use crate::sim::event::SoundCue;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: HashMap<SoundCue, Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("no audio output: {e}");
                    return None;
                }
            };

            let buffers = [
                SoundCue::Step,
                SoundCue::Push,
                SoundCue::Blocked,
                SoundCue::Undo,
                SoundCue::BoxOnGoal,
                SoundCue::Victory,
                SoundCue::Fail,
                SoundCue::Pause,
            ]
            .into_iter()
            .map(|cue| (cue, Arc::new(make_wav(&render(cue)))))
            .collect();

            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, cue: SoundCue) {
            let Some(buf) = self.buffers.get(&cue) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }
    }

    fn render(cue: SoundCue) -> Vec<f32> {
        match cue {
            SoundCue::Step => gen_tick(),
            SoundCue::Push => gen_thud(),
            SoundCue::Blocked => gen_notes(&[(110.0, 0.06), (98.0, 0.06)], 0.18),
            SoundCue::Undo => gen_sweep(900.0, 500.0, 0.07, 0.2),
            SoundCue::BoxOnGoal => gen_notes(&[(784.0, 0.06), (1047.0, 0.12)], 0.25), // G5, C6
            SoundCue::Victory => {
                // C5 E5 G5 C6, last one held
                gen_notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.35)], 0.3)
            }
            SoundCue::Fail => gen_notes(&[(440.0, 0.12), (370.0, 0.12), (311.0, 0.12), (261.0, 0.25)], 0.3),
            SoundCue::Pause => gen_sweep(600.0, 600.0, 0.05, 0.2),
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators (mono f32 samples)
    // ════════════════════════════════════════════════════════════

    fn samples_for(seconds: f32) -> usize {
        (SAMPLE_RATE as f32 * seconds) as usize
    }

    /// Footstep: very short low click.
    fn gen_tick() -> Vec<f32> {
        let n = samples_for(0.025);
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = (1.0 - i as f32 / n as f32).powi(2);
                (t * 180.0 * TAU).sin() * env * 0.15
            })
            .collect()
    }

    /// Box push: tone under a burst of LCG noise.
    fn gen_thud() -> Vec<f32> {
        let n = samples_for(0.09);
        let mut rng: u32 = 0x2545_F491;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                let t = i as f32 / SAMPLE_RATE as f32;
                let tone = (t * (140.0 - p * 60.0) * TAU).sin();
                rng = rng.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                (tone * 0.6 + noise * 0.4) * (1.0 - p).powf(0.7) * 0.3
            })
            .collect()
    }

    /// Linear pitch sweep from `from` to `to` Hz.
    fn gen_sweep(from: f32, to: f32, seconds: f32, volume: f32) -> Vec<f32> {
        let n = samples_for(seconds);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                phase += (from + (to - from) * p) / SAMPLE_RATE as f32;
                (phase * TAU).sin() * (1.0 - p) * volume
            })
            .collect()
    }

    /// A note sequence with a little second harmonic for a brighter tone.
    fn gen_notes(notes: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, seconds) in notes {
            let n = samples_for(seconds);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.6);
                let wave = (t * freq * TAU).sin() * 0.75 + (t * freq * 2.0 * TAU).sin() * 0.25;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: 16-bit PCM mono
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let channels: u16 = 1;
        let bits: u16 = 16;
        let block_align = channels * bits / 8;
        let byte_rate = SAMPLE_RATE * block_align as u32;
        let data_size = samples.len() as u32 * block_align as u32;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API: no-ops when the sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _cue: crate::sim::event::SoundCue) {}
}
