//! Benchmarks for output lookup and binding resolution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackflow::core::{Outputs, Region, StackStatus};
use stackflow::outputs::{OutputResolver, OutputTable};
use stackflow::plan::{StackSpec, TemplateHandle};
use stackflow::provider::StackDescription;

fn outputs(prefix: &str, count: usize) -> Outputs {
    (0..count)
        .map(|i| (format!("{prefix}Output{i}"), format!("value-{i}")))
        .collect()
}

fn binding_benchmark(c: &mut Criterion) {
    let mut table = OutputTable::new();
    table.merge("acm-certificate-stack", outputs("Cert", 8));
    table.merge("portfolio-website-stack", outputs("Site", 32));

    let mut builder = StackSpec::builder(
        "cicd-pipeline-stack",
        Region::us_west_2(),
        TemplateHandle::new("cicd-pipeline-stack.yaml", "Resources: {}"),
    )
    .expect("valid stack name")
    .literal("Branch", "main");
    for i in 0..16 {
        builder = builder.output_ref(format!("Param{i}"), "portfolio-website-stack", format!("SiteOutput{i}"));
    }
    let spec = builder.build();

    c.bench_function("resolve_bindings_16", |b| {
        b.iter(|| black_box(table.resolve_bindings(black_box(&spec))))
    });

    let description = StackDescription::new("portfolio-website-stack", StackStatus::UpdateComplete)
        .with_outputs(&outputs("Site", 64));
    let resolver = OutputResolver::new();

    c.bench_function("resolve_all_64", |b| {
        b.iter(|| black_box(resolver.resolve_all(black_box(&description))))
    });

    c.bench_function("resolve_last_of_64", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&description), "SiteOutput63")))
    });
}

criterion_group!(benches, binding_benchmark);
criterion_main!(benches);
