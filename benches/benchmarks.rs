//! Performance benchmarks for bmad-automation.
//!
//! This module contains benchmarks for:
//! - Menu pattern matching over long agent transcripts
//! - The full detect, guard and score pipeline
//! - Verdict and checklist scanning
//! - Selection routing and checkpoint rendering
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use bmad_automation::control::{Checkpoint, LoggedOperation};
use bmad_automation::detection::{detect_checklist, detect_menus, detect_verdict, score, MenuDetector};
use bmad_automation::selection::{MenuSelector, ValidationMetrics};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    /// Generate an agent transcript with `sections` steps.
    ///
    /// Every step carries prose, a checklist, and one of several menu
    /// shapes. Some menus sit inside code fences or quotes so the guards
    /// have work to do.
    pub fn generate_transcript(sections: usize) -> String {
        let menus = [
            "[A] Advanced Elicitation [P] Party Mode [C] Continue",
            "[Y] Yes, apply\n[V] View diff\n[N] No",
            "1. Create PRD\n2. Create architecture\n3. Exit",
            "```\n[A] Advanced [P] Party [C] Continue\n```",
            "> [Y] Yes [V] View [N] No",
            "For example: [Q] Quit [R] Retry",
        ];

        let mut out = String::new();
        for i in 0..sections {
            out.push_str(&format!("## Step {}: Section {}\n\n", i + 1, i));
            out.push_str("The analyst reviewed the brief and drafted the requirements below. ");
            out.push_str("Open questions are tracked in the risk register.\n\n");
            out.push_str("- [x] Goals captured\n- [x] Users identified\n- [ ] Metrics agreed\n\n");
            out.push_str(menus[i % menus.len()]);
            out.push_str("\n\n");
        }
        out.push_str("**Verdict:** CONCERNS\n");
        out
    }

    /// Generate an operation log of `count` entries.
    pub fn generate_operations(count: usize) -> Vec<super::LoggedOperation> {
        let actions = ["write", "selected", "output", "verdict", "guard veto", "enter"];
        (0..count)
            .map(|i| {
                super::LoggedOperation::new(
                    actions[i % actions.len()],
                    format!("docs/section-{i}.md"),
                )
            })
            .collect()
    }
}

// ============================================================================
// Detection Benchmarks
// ============================================================================

fn bench_detect_menus(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_menus");

    for sections in [10, 100, 1000] {
        let text = fixtures::generate_transcript(sections);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &text, |b, text| {
            b.iter(|| black_box(detect_menus(black_box(text))));
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let detector = MenuDetector::default();

    for sections in [10, 100, 1000] {
        let text = fixtures::generate_transcript(sections);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &text, |b, text| {
            b.iter(|| black_box(detector.analyze(black_box(text))));
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let text = fixtures::generate_transcript(100);
    let candidates = detect_menus(&text);

    c.bench_function("score_all_candidates", |b| {
        b.iter(|| {
            for candidate in &candidates {
                black_box(score(&text, candidate));
            }
        });
    });
}

fn bench_verdict_and_checklist(c: &mut Criterion) {
    let mut group = c.benchmark_group("verdict_checklist");
    let text = fixtures::generate_transcript(500);
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("verdict", |b| {
        b.iter(|| black_box(detect_verdict(black_box(&text))));
    });

    group.bench_function("checklist", |b| {
        b.iter(|| black_box(detect_checklist(black_box(&text))));
    });

    group.finish();
}

// ============================================================================
// Selection & Checkpoint Benchmarks
// ============================================================================

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let text = fixtures::generate_transcript(1);
    let candidate = detect_menus(&text).into_iter().next().expect("fixture has a menu");
    let metrics = ValidationMetrics::parse("blocking_errors=0, major_issues=1, compliance_score=92")
        .expect("valid metrics");

    group.bench_function("route_without_metrics", |b| {
        let mut selector = MenuSelector::default();
        b.iter(|| black_box(selector.select(candidate.clone(), Some(92.0), None)));
    });

    group.bench_function("route_with_metrics", |b| {
        let mut selector = MenuSelector::default();
        b.iter(|| black_box(selector.select(candidate.clone(), Some(65.0), Some(&metrics))));
    });

    group.finish();
}

fn bench_checkpoint_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_render");

    for count in [10, 100, 1000] {
        let operations = fixtures::generate_operations(count);
        for confidence in [85.0, 65.0, 30.0] {
            let checkpoint = Checkpoint::new(confidence, operations.clone());
            group.bench_with_input(
                BenchmarkId::new(checkpoint.format().to_string(), count),
                &checkpoint,
                |b, checkpoint| b.iter(|| black_box(checkpoint.render())),
            );
        }
    }

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(detection_benches, bench_detect_menus, bench_analyze, bench_score,);

criterion_group!(scanning_benches, bench_verdict_and_checklist,);

criterion_group!(control_benches, bench_selection, bench_checkpoint_render,);

criterion_main!(detection_benches, scanning_benches, control_benches,);
