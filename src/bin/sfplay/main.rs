//! sfplay - plays a short chord progression through a procedural bank
//!
//! Run with: cargo run --bin sfplay

use std::thread;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use saavy_sf::bank::generator::GeneratorType;
use saavy_sf::bank::parts::{BankBuilder, ZoneBuilder};
use saavy_sf::{InstrumentBank, RenderOutput, SynthConfig, SynthEvent, SynthHandle, Synthesizer, MAX_BLOCK_SIZE};

// 100 frames per cycle at 44 kHz is exactly A440
const WAVE_RATE: u32 = 44_000;
const CYCLE: usize = 100;
const CYCLES: usize = 20;

const CHORDS: [[u8; 3]; 4] = [[57, 60, 64], [53, 57, 60], [48, 52, 55], [55, 59, 62]];

fn wave(shape: impl Fn(f32) -> f32) -> Vec<f32> {
    (0..CYCLE * CYCLES)
        .map(|i| shape((i % CYCLE) as f32 / CYCLE as f32) * 0.6)
        .collect()
}

fn demo_bank() -> color_eyre::Result<InstrumentBank> {
    let mut b = BankBuilder::new("sfplay demo");
    let len = CYCLE * CYCLES;
    let sine = b.add_looped_sample("sine", &wave(|p| (p * std::f32::consts::TAU).sin()), WAVE_RATE, 69, 0, len);
    let saw = b.add_looped_sample("saw", &wave(|p| 2.0 * p - 1.0), WAVE_RATE, 69, 0, len);

    let pad = b.add_instrument(
        "pad",
        vec![ZoneBuilder::sample(sine)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::AttackVolEnv, -2400)
            .generator(GeneratorType::ReleaseVolEnv, -600)
            .generator(GeneratorType::VibLfoToPitch, 8)],
    );
    let lead = b.add_instrument(
        "lead",
        vec![ZoneBuilder::sample(saw)
            .generator(GeneratorType::SampleModes, 1)
            .generator(GeneratorType::InitialFilterFc, 7200)
            .generator(GeneratorType::InitialFilterQ, 90)
            .generator(GeneratorType::ModEnvToFilterFc, 2400)
            .generator(GeneratorType::DecayModEnv, -1200)
            .generator(GeneratorType::ReleaseVolEnv, -2400)],
    );
    b.add_preset("pad", 0, 0, vec![ZoneBuilder::instrument(pad)]);
    b.add_preset("lead", 0, 1, vec![ZoneBuilder::instrument(lead)]);

    InstrumentBank::from_parts(b.build()).wrap_err("demo bank rejected")
}

fn play(handle: &mut SynthHandle) -> color_eyre::Result<()> {
    handle.program_change(1, 1)?;
    handle.controller_change(0, 91, 60)?;
    handle.controller_change(1, 10, 96)?;

    for chord in CHORDS {
        for &note in &chord {
            handle.note_on(0, note, 90)?;
        }
        handle.note_on(1, chord[2] + 12, 110)?;
        thread::sleep(Duration::from_millis(900));

        for &note in &chord {
            handle.note_off(0, note)?;
        }
        handle.note_off(1, chord[2] + 12)?;
        thread::sleep(Duration::from_millis(200));
        drain_events(handle);
    }

    thread::sleep(Duration::from_millis(1200));
    drain_events(handle);
    Ok(())
}

fn drain_events(handle: &mut SynthHandle) {
    while let Some(event) = handle.poll_event() {
        match event {
            SynthEvent::VoiceCount { total, .. } if total > 0 => info!(voices = total, "playing"),
            SynthEvent::NoteFinished { channel, note } => info!(channel, note, "note finished"),
            _ => {}
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;
    info!(sample_rate, channels, "output device ready");

    let synth_config = SynthConfig {
        sample_rate,
        ..SynthConfig::default()
    };
    let (mut synth, mut handle) = Synthesizer::new(synth_config, demo_bank()?)?;

    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let (l, r) = (&mut left[..frames], &mut right[..frames]);
                synth.render_block(&mut RenderOutput::stereo(l, r));

                let out = &mut data[frames_written * channels..(frames_written + frames) * channels];
                for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        *sample = if ch % 2 == 0 { left[i] } else { right[i] };
                    }
                }
                frames_written += frames;
            }
        },
        |err| warn!(%err, "audio stream error"),
        None,
    )?;

    stream.play()?;
    play(&mut handle)
}
