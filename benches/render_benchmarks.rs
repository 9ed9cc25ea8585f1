use criterion::{black_box, criterion_group, criterion_main, Criterion};

use synthcore::command::{effect, part, section};
use synthcore::factory::kind;
use synthcore::{CommandBlock, MidiEvent, Origin, Synth, SynthConfig};

const BLOCK: usize = 256;

fn chord() -> Vec<MidiEvent> {
    [48, 55, 60, 64, 67]
        .into_iter()
        .map(|note| MidiEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("Synth.process() one part", |b| {
        let mut synth = Synth::new(SynthConfig::default().with_buffer_size(BLOCK)).unwrap();
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        synth.process(&chord(), &mut left, &mut right);

        b.iter(|| {
            synth.process(&[], &mut left, &mut right);
            black_box(left[0]);
        })
    });

    c.bench_function("Synth.process() with effects", |b| {
        let mut synth = Synth::new(SynthConfig::default().with_buffer_size(BLOCK)).unwrap();
        let mut gui = synth.connect(Origin::Gui);
        for e in 0..2u8 {
            let kind = if e == 0 { kind::ECHO } else { kind::DISTORTION };
            gui.send(CommandBlock::write(f32::from(kind), effect::TYPE, section::SYSTEM_EFFECTS).with_engine(e))
                .unwrap();
            gui.set(80.0, part::SYS_SEND_BASE + e, 0).unwrap();
        }
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        synth.process(&chord(), &mut left, &mut right);

        b.iter(|| {
            synth.process(&[], &mut left, &mut right);
            black_box(left[0]);
        })
    });

    c.bench_function("Controller.set() + drain", |b| {
        let mut synth = Synth::new(SynthConfig::default().with_buffer_size(BLOCK)).unwrap();
        let mut gui = synth.connect(Origin::Gui);
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        let mut pan = 0.0;

        b.iter(|| {
            pan = (pan + 1.0) % 128.0;
            let _ = gui.set(pan, part::PANNING, 0);
            synth.process(&[], &mut left, &mut right);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
