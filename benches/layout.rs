//! Benchmarks for chapter layout.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tome::layout::{CellMetrics, ChapterWindow, LayoutStyle, WindowConfig};

fn book(chapters: usize) -> Vec<String> {
    (0..chapters)
        .map(|c| {
            let mut text = format!("第{}章 标题\n", c + 1);
            for _ in 0..200 {
                text.push_str("夜色沉沉，远处传来几声犬吠，他合上书页，起身推开了窗。风从窗外吹进来，带着潮湿的泥土气味。\n");
            }
            text
        })
        .collect()
}

fn window() -> ChapterWindow {
    ChapterWindow::new(
        CellMetrics::default(),
        LayoutStyle::default(),
        WindowConfig::default(),
        400.0,
        600.0,
    )
}

fn bench_load_centered(c: &mut Criterion) {
    let chapters = book(20);
    c.bench_function("load_centered", |b| {
        b.iter(|| {
            let mut window = window();
            window.load_centered(chapters.as_slice(), black_box(10)).unwrap();
            window
        })
    });
}

fn bench_relayout(c: &mut Criterion) {
    let chapters = book(20);
    let mut window = window();
    window.load_centered(chapters.as_slice(), 10).unwrap();
    let mut style = LayoutStyle::default();
    c.bench_function("relayout", |b| {
        b.iter(|| {
            style.set_font_size(if style.font_size > 16.0 { 16.0 } else { 18.0 });
            window.set_style(black_box(style.clone()));
        })
    });
}

fn bench_visible_rows(c: &mut Criterion) {
    let chapters = book(20);
    let mut window = window();
    window.load_centered(chapters.as_slice(), 10).unwrap();
    c.bench_function("visible_rows", |b| b.iter(|| window.visible_rows().len()));
}

criterion_group!(benches, bench_load_centered, bench_relayout, bench_visible_rows);
criterion_main!(benches);
