//! Benchmarks for notification fan-out, relinking and sorted views.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use proptree_core::{Courier, DerivedView, PropTree, SortBy, SubscribeOptions};

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    for subscribers in [1usize, 16, 256] {
        group.bench_with_input(
            BenchmarkId::new("inline", subscribers),
            &subscribers,
            |b, &n| {
                let tree = PropTree::default();
                let root = tree.create_root(Some("r"));
                let node = root.create_child("value").unwrap();
                let sink = Arc::new(AtomicI32::new(0));
                let _subs: Vec<_> = (0..n)
                    .map(|_| {
                        tree.subscribe(
                            SubscribeOptions::new()
                                .root(&root)
                                .path_str("r.value")
                                .inline()
                                .store_int(sink.clone()),
                        )
                        .unwrap()
                    })
                    .collect();
                let mut i = 0;
                b.iter(|| {
                    i += 1;
                    node.set_int(black_box(i));
                });
                black_box(sink.load(Ordering::Relaxed));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("passive", subscribers),
            &subscribers,
            |b, &n| {
                let tree = PropTree::default();
                let root = tree.create_root(Some("r"));
                let node = root.create_child("value").unwrap();
                let courier = Courier::passive();
                let _subs: Vec<_> = (0..n)
                    .map(|_| {
                        tree.subscribe(
                            SubscribeOptions::new()
                                .root(&root)
                                .path_str("r.value")
                                .courier(&courier)
                                .on_int(|v| {
                                    black_box(v);
                                }),
                        )
                        .unwrap()
                    })
                    .collect();
                let mut i = 0;
                b.iter(|| {
                    i += 1;
                    node.set_int(i);
                    courier.poll()
                });
            },
        );
    }
    group.finish();
}

fn bench_relink(c: &mut Criterion) {
    let mut group = c.benchmark_group("relink");
    for pages in [2usize, 32] {
        group.bench_with_input(BenchmarkId::new("page_switch", pages), &pages, |b, &n| {
            let tree = PropTree::default();
            let r = tree.create_root(Some("top"));
            let list = r.create_child("pages").unwrap();
            let current = r.create_child("current").unwrap();
            let page: Vec<_> = (0..n)
                .map(|i| {
                    let p = list.create_anonymous().unwrap();
                    p.create_path("model.loading").unwrap().set_int(i as i32);
                    p.create_path("model.title").unwrap().set_str("page");
                    p
                })
                .collect();
            let _subs: Vec<_> = ["top.current.model.loading", "top.current.model.title"]
                .into_iter()
                .map(|path| {
                    tree.subscribe(
                        SubscribeOptions::new()
                            .root(&r)
                            .path_str(path)
                            .inline()
                            .on_event(|e| {
                                black_box(e);
                            }),
                    )
                    .unwrap()
                })
                .collect();

            let mut i = 0;
            b.iter(|| {
                current.link_to(&page[i % n]);
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_sorted_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorted_view");
    for items in [100usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("retitle", items), &items, |b, &n| {
            let tree = PropTree::default();
            let src = tree.create_root(None);
            let dest = tree.create_root(None);
            let titles: Vec<_> = (0..n)
                .map(|i| {
                    let item = src.create_anonymous().unwrap();
                    let title = item.create_child("title").unwrap();
                    title.set_str(&format!("{:08}", i * 7 % n));
                    title
                })
                .collect();
            let _view = DerivedView::builder(&dest)
                .source(&src)
                .transform(SortBy::ascending("title"))
                .build()
                .unwrap();

            let mut i = 0;
            b.iter(|| {
                titles[i % n].set_str(&format!("{:08}", black_box(i * 13 % n)));
                i += 1;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fanout, bench_relink, bench_sorted_view);
criterion_main!(benches);
