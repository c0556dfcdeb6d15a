use std::cell::RefCell;
use std::io;
use std::io::Write;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use vm::{Engine, Outcome};

fn engine() -> Engine {
    let sink: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(io::sink()));
    Engine::new(sink)
}

fn benchmark(c: &mut Criterion) {
    let src = include_str!("../../data/calls.crash");

    c.bench_function("compile calls", |b| {
        let engine = engine();
        b.iter(|| engine.compile(src).unwrap())
    });

    c.bench_function("run calls", |b| {
        let mut engine = engine();
        let program = engine.compile(src).unwrap();
        b.iter(|| engine.run(&program).unwrap())
    });

    c.bench_function("resume 32 yields", |b| {
        let mut engine = engine();
        let program = engine
            .compile("f := func () { yield; yield; yield; yield }; f; f; f; f; f; f; f; f; 'done'")
            .unwrap();

        b.iter(|| {
            let mut outcome = engine.run(&program).unwrap();
            while let Outcome::Suspended(suspension) = outcome {
                outcome = engine.resume(suspension).unwrap();
            }
            outcome
        })
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
