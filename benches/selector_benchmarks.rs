use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use haul::extractor::classify_line;
use haul::EngineSelector;

fn benchmark_engine_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Engine Selection");
    let selector = EngineSelector::default();

    let links = [
        ("magnet", "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a"),
        ("torrent", "https://releases.ubuntu.com/24.04/ubuntu-24.04-desktop-amd64.iso.torrent"),
        ("streaming", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        ("plain_http", "https://cdn.example.org/files/archive.tar.gz"),
        ("malformed", "not a link at all"),
    ];

    for (label, link) in links {
        group.bench_with_input(BenchmarkId::new("select", label), &link, |b, link| {
            b.iter(|| selector.select(black_box(link)))
        });
    }

    group.finish();
}

fn benchmark_domain_list_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("Domain List Size");
    let link = "https://cdn.example.org/files/archive.tar.gz";

    for count in [10usize, 100, 1000] {
        let selector = EngineSelector::new((0..count).map(|i| format!("stream{}.example", i)));
        group.bench_with_input(BenchmarkId::new("domains", count), &count, |b, _| {
            b.iter(|| selector.select(black_box(link)))
        });
    }

    group.finish();
}

fn benchmark_progress_parsing(c: &mut Criterion) {
    let lines = [
        ("progress", r#"{"totalLength":104857600,"completedLength":52428800,"downloadSpeed":1048576.5}"#),
        ("progress_na", r#"{"totalLength":NA,"completedLength":52428800,"downloadSpeed":NA}"#),
        ("destination", "[download] Destination: /data/downloads/Some Video Title.webm"),
    ];

    let mut group = c.benchmark_group("yt-dlp Output");
    for (label, line) in lines {
        group.bench_with_input(BenchmarkId::new("classify_line", label), &line, |b, line| {
            b.iter(|| classify_line(black_box(line)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_engine_selection,
    benchmark_domain_list_size,
    benchmark_progress_parsing
);
criterion_main!(benches);
