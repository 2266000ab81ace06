//! Criterion benchmarks for stack compilation
//!
//! These benchmarks measure the build-time pipeline: full stack compilation
//! from a parsed configuration, and graph validation at larger node counts
//! than any real stack reaches, to keep the validation pass comfortably
//! inside interactive synth times.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use searchstack::config::StackConfig;
use searchstack::graph::{ResourceGraph, ResourceKind, ResourceRef};
use searchstack::stack::StackCompiler;

// =============================================================================
// Test Fixtures
// =============================================================================

const EMPLOYEE: &str = r#"
collection:
  name: employee
  type: SEARCH
  description: Search collection
environment:
  region: us-east-1
  account: "111111111111"
search:
  artifact: artifacts/search-service.zip
  handler: com.example.search.SearchHandler::handleRequest
ingest:
  artifact: artifacts/search-service.zip
  handler: com.example.search.IngestHandler::handleRequest
"#;

/// Build a layered random DAG: each node depends on a few earlier nodes
fn random_dag(nodes: usize, seed: u64) -> ResourceGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = ResourceGraph::new();

    let refs: Vec<ResourceRef> = (0..nodes)
        .map(|i| ResourceRef::new(ResourceKind::Function, format!("fn-{i}")))
        .collect();
    for r in &refs {
        graph.add_node(r.clone());
    }
    // Edges only point backwards, so the graph stays acyclic.
    for (i, dependent) in refs.iter().enumerate().skip(1) {
        let fanin = rng.gen_range(1..=3.min(i));
        for _ in 0..fanin {
            let prerequisite = &refs[rng.gen_range(0..i)];
            graph.depends_on(dependent.clone(), prerequisite.clone());
        }
    }
    graph
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_compile(c: &mut Criterion) {
    let config = StackConfig::from_yaml(EMPLOYEE).unwrap();

    c.bench_function("stack/compile", |b| {
        b.iter(|| StackCompiler::compile(black_box(&config), black_box("abc123")).unwrap())
    });

    c.bench_function("stack/manifest_json", |b| {
        let stack = StackCompiler::compile(&config, "abc123").unwrap();
        b.iter(|| stack.manifest().unwrap().to_json().unwrap())
    });
}

fn bench_graph_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/validate");
    for nodes in [16usize, 128, 1024] {
        let graph = random_dag(nodes, 42);
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &graph, |b, graph| {
            b.iter(|| black_box(graph).validate().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_graph_validation);
criterion_main!(benches);
