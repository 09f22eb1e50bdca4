// Run with:  cargo bench --bench swap_buffers

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use hub_panel::sim::VirtualPanel;
use hub_panel::{Engine, Panel, PanelConfig};
use std::hint::black_box;

static ENGINE: Engine<VirtualPanel> = Engine::new();

fn swap_buffers(c: &mut Criterion) {
    let config = PanelConfig::HUB08_64X32.with_chain(2);
    let mut group = c.benchmark_group("swap_buffers");
    group.throughput(Throughput::Bytes(config.geometry.buffer_len() as u64));

    let mut panel = Panel::configure(&ENGINE, config, VirtualPanel::quiet()).unwrap();

    group.bench_function("no_copy", |b| {
        b.iter(|| black_box(&mut panel).swap_buffers(black_box(false)));
    });

    group.bench_function("copy_front_to_back", |b| {
        b.iter(|| black_box(&mut panel).swap_buffers(black_box(true)));
    });

    group.bench_function("clear_and_swap", |b| {
        b.iter(|| {
            panel.clear();
            black_box(&mut panel).swap_buffers(false);
        });
    });

    group.finish();
}

criterion_group!(benches, swap_buffers);
criterion_main!(benches);
