use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lesscss_engine::{compile_file, CompileOptions, Compiler};

struct Case {
    name: &'static str,
    source: &'static str,
}

const CASES: [Case; 4] = [
    Case {
        name: "baseline",
        source: include_str!("../fixtures/benchmark.less"),
    },
    Case {
        name: "import",
        source: include_str!("../fixtures/import.less"),
    },
    Case {
        name: "mixins",
        source: include_str!("../fixtures/mixins.less"),
    },
    Case {
        name: "arithmetic",
        source: include_str!("../fixtures/arithmetic.less"),
    },
];

fn compile_benchmarks(c: &mut Criterion) {
    for case in &CASES {
        for minify in [false, true] {
            bench_case(c, case, minify);
        }
    }
}

fn bench_case(c: &mut Criterion, case: &Case, minify: bool) {
    let mut group = c.benchmark_group(format!("less_compile/{}", case.name));
    group.throughput(Throughput::Bytes(case.source.len() as u64));

    let compiler = Compiler::new(CompileOptions {
        minify,
        ..CompileOptions::default()
    });
    let id = BenchmarkId::new(case.name, if minify { "min" } else { "pretty" });
    group.bench_with_input(id, case.source, |b, source| {
        b.iter(|| compiler.compile(source).unwrap());
    });

    group.finish();
}

/// 带 @import 展开的完整文件编译。
fn compile_file_benchmark(c: &mut Criterion) {
    c.bench_function("less_compile_file/styles_base", |b| {
        b.iter(|| compile_file("fixtures/styles/base.less", CompileOptions::default()).unwrap());
    });
}

criterion_group!(benches, compile_benchmarks, compile_file_benchmark);
criterion_main!(benches);
