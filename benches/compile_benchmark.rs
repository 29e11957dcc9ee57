//! Benchmarks for rule parsing, compilation and dispatch.
//!
//! Run with: cargo bench --features bench
//!
//! This benchmark suite measures:
//! - Parse throughput for typical command lines
//! - Parse + compile cost with and without a target extension
//! - Check cost as chains grow (matching by content scans the chain)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::net::Ipv4Addr;

use arprule::{
    CommandDispatcher, ExtensionRegistry, Invocation, MemoryEngine, RuleCompiler, RuleSpecParser,
    StaticResolver, TableEngine,
};

const SIMPLE: &[&str] = &["-A", "INPUT", "-s", "10.0.0.1", "-j", "DROP"];

const FULL: &[&str] = &[
    "-A",
    "FORWARD",
    "-s",
    "10.0.0.0/8",
    "-d",
    "192.168.1.0/255.255.255.0",
    "--src-mac",
    "00:11:22:33:44:55/ff:ff:ff:00:00:00",
    "-l",
    "6",
    "--opcode",
    "Request",
    "--h-type",
    "1",
    "--proto-type",
    "0x800",
    "-i",
    "eth+",
    "-j",
    "mangle",
    "--mangle-ip-s",
    "10.9.9.9",
    "--mangle-mac-s",
    "00:de:ad:be:ef:00",
];

fn resolver() -> StaticResolver {
    StaticResolver::new()
}

fn bench_parse(c: &mut Criterion) {
    let registry = ExtensionRegistry::with_builtins().unwrap();
    let resolver = resolver();
    let mut parser = RuleSpecParser::new(&registry, &resolver);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));
    for (name, args) in [("simple", SIMPLE), ("full", FULL)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), args, |b, args| {
            b.iter(|| parser.parse(black_box(args)).unwrap())
        });
    }
    group.finish();
}

fn bench_parse_compile(c: &mut Criterion) {
    let registry = ExtensionRegistry::with_builtins().unwrap();
    let resolver = resolver();
    let mut parser = RuleSpecParser::new(&registry, &resolver);
    let compiler = RuleCompiler::new(&registry);

    let mut group = c.benchmark_group("parse_compile");
    for (name, args) in [("simple", SIMPLE), ("full", FULL)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), args, |b, args| {
            b.iter(|| {
                let Invocation::Command(mut cmd) = parser.parse(black_box(args)).unwrap() else {
                    unreachable!()
                };
                let target = match cmd.target.take() {
                    Some(target) => target,
                    None => arprule::extension::ExtensionInstance::new(
                        registry.standard_target().unwrap(),
                        &cmd.jumpto,
                    ),
                };
                compiler.compile(&cmd.spec, &cmd.matches, &target).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_delete_scan(c: &mut Criterion) {
    let registry = ExtensionRegistry::with_builtins().unwrap();
    let resolver = resolver();
    let dispatcher = CommandDispatcher::new(&registry);

    let mut group = c.benchmark_group("delete_scan");
    for size in [10u32, 100, 1000] {
        let mut engine = MemoryEngine::new("filter").unwrap();
        let mut parser = RuleSpecParser::new(&registry, &resolver);
        for i in 0..size {
            let addr = Ipv4Addr::from(0x0a00_0000 + i).to_string();
            let args = ["-A", "INPUT", "-s", addr.as_str(), "-j", "ACCEPT"];
            if let Invocation::Command(cmd) = parser.parse(&args).unwrap() {
                dispatcher.dispatch(cmd, &mut engine).unwrap();
            }
        }

        // Checking the last rule walks the whole chain
        let last = Ipv4Addr::from(0x0a00_0000 + size - 1).to_string();
        group.bench_with_input(BenchmarkId::from_parameter(size), &last, |b, last| {
            b.iter(|| {
                let Invocation::Command(cmd) = parser
                    .parse(&["-C", "INPUT", "-s", last.as_str(), "-j", "ACCEPT"])
                    .unwrap()
                else {
                    unreachable!()
                };
                assert!(dispatcher.dispatch(cmd, &mut engine).unwrap().success);
            })
        });
        assert_eq!(engine.rules("INPUT").unwrap().len(), size as usize);
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_parse_compile, bench_delete_scan);
criterion_main!(benches);
