/// Throughput of risk aggregation and journey mapping over synthetic evidence.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use riskmap::config::{Journey, JourneyConfig, RiskConfig};
use riskmap::evidence::{
    Churn, Coverage, Draft, EvidenceId, EvidenceKind, Finding, FindingCategory, Record, Severity,
};
use riskmap::{JourneyMapper, RiskEngine, RiskInputs};
use std::hint::black_box;

const DATE: &str = "20251024";

fn synthetic_inputs(components: usize) -> RiskInputs {
    let path = |i: usize| format!("src/module_{}/file_{}.py", i % 17, i);
    let severities = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

    let findings: Vec<Record<Finding>> = (0..components * 2)
        .map(|i| {
            Draft::new(
                "bandit",
                Finding {
                    component: path(i % components),
                    line: Some(i as u32),
                    column: None,
                    severity: severities[i % severities.len()],
                    category: FindingCategory::Security,
                    code: None,
                    message: "synthetic".to_string(),
                    confidence: 0.8,
                },
            )
            .into_record(EvidenceId::new(EvidenceKind::Findings, DATE, i as u32 + 1))
        })
        .collect();

    let coverage: Vec<Record<Coverage>> = (0..components)
        .map(|i| {
            Draft::new("coverage", Coverage::new(path(i), (i % 100) as u64, 100))
                .into_record(EvidenceId::new(EvidenceKind::Coverage, DATE, i as u32 + 1))
        })
        .collect();

    let churn: Vec<Record<Churn>> = (0..components)
        .map(|i| {
            Draft::new(
                "git-churn",
                Churn {
                    component: path(i),
                    commits: (i % 40) as u32,
                    lines_added: (i * 7 % 900) as u64,
                    lines_removed: (i * 3 % 400) as u64,
                    contributors: 1 + (i % 5) as u32,
                    window_days: 90,
                    last_commit_at: None,
                },
            )
            .into_record(EvidenceId::new(EvidenceKind::Churn, DATE, i as u32 + 1))
        })
        .collect();

    RiskInputs {
        findings,
        coverage,
        churn,
    }
}

fn bench_assess(c: &mut Criterion) {
    let engine = RiskEngine::new(RiskConfig::default());
    let mut group = c.benchmark_group("risk_assess");

    for components in [100, 1_000, 5_000] {
        let inputs = synthetic_inputs(components);
        group.bench_with_input(
            BenchmarkId::new("components", components),
            &inputs,
            |b, inputs| b.iter(|| black_box(engine.assess(black_box(inputs)))),
        );
    }

    group.finish();
}

fn bench_journeys(c: &mut Criterion) {
    let journeys = (0..17)
        .map(|i| Journey {
            id: format!("journey-{}", i),
            name: format!("Journey {}", i),
            patterns: vec![format!("src/module_{}/*", i)],
            target: 80.0,
        })
        .collect();
    let mapper = JourneyMapper::new(JourneyConfig {
        journeys,
        ..JourneyConfig::default()
    });
    let coverage = synthetic_inputs(5_000).coverage;

    c.bench_function("journey_evaluate_5000", |b| {
        b.iter(|| black_box(mapper.evaluate(black_box(&coverage))))
    });
}

criterion_group!(benches, bench_assess, bench_journeys);
criterion_main!(benches);
