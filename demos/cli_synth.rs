//! Command-line synth: play a short phrase through the default output
//!
//! Run with: cargo run --example cli_synth --features cpal_sink
//!
//! Lists available devices and lets you pick one, then plays a few notes
//! while changing part and effect settings through a control channel.

use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

use synthcore::command::{effect, master, part, section};
use synthcore::factory::kind;
use synthcore::{CommandBlock, CpalDevice, MidiEvent, Origin, Synth, SynthConfig};

fn main() {
    tracing_subscriber::fmt::init();

    let devices = CpalDevice::list_outputs();
    if devices.is_empty() {
        eprintln!("No audio output devices found!");
        return;
    }

    println!("Available audio output devices:");
    for (i, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {} ({}Hz, {} ch)",
            i,
            device.name(),
            device.sample_rate(),
            device.channels()
        );
    }

    print!("\nSelect device [0]: ");
    io::stdout().flush().unwrap();

    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    let choice: usize = input.trim().parse().unwrap_or(0);

    let device = devices.into_iter().nth(choice).unwrap_or_else(|| {
        println!("Invalid choice, using default device");
        CpalDevice::default_output().expect("No default device")
    });

    println!("\nUsing: {} @ {}Hz", device.name(), device.sample_rate());

    let config = device.synth_config(SynthConfig::default());
    let mut synth = Synth::new(config).expect("Failed to build synth");
    let mut cli = synth.connect(Origin::Cli);
    let mut midi = synth.midi_input();

    // echo on system effect 0, part 0 sends into it
    cli.send(CommandBlock::write(kind::ECHO as f32, effect::TYPE, section::SYSTEM_EFFECTS).with_engine(0))
        .unwrap();
    cli.set(80.0, part::SYS_SEND_BASE, 0).unwrap();
    cli.set(100.0, master::VOLUME, section::MAIN).unwrap();

    let _sink = device.start(synth).expect("Failed to start output");

    let phrase = [60u8, 64, 67, 72, 67, 64, 60];
    for (step, note) in phrase.iter().enumerate() {
        // sweep the pan across the phrase
        let pan = step as f32 / (phrase.len() - 1) as f32 * 127.0;
        if let Ok(reply) = cli.set(pan, part::PANNING, 0) {
            println!("note {note}, pan {pan:.0} ({reply:?})");
        }

        midi.send(MidiEvent::NoteOn {
            channel: 0,
            note: *note,
            velocity: 100,
        })
        .ok();
        sleep(Duration::from_millis(300));
        midi.send(MidiEvent::NoteOff {
            channel: 0,
            note: *note,
        })
        .ok();
        sleep(Duration::from_millis(50));
    }

    // let the echo ring out
    sleep(Duration::from_secs(2));

    let meters = cli.interface().meters();
    println!("\nPeak: {:.3} / {:.3}", meters.max_peak_l, meters.max_peak_r);
}
