//! Build throughput over a chained stack: every component addresses its
//! predecessor, so the run exercises dependency collection, topological
//! ordering and per-component resolution.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use rigforge_api_core::{Address, Value};
use rigforge_stack_core::{
    BuildContext, Component, ComponentCore, Config, DeclareOpts, Registry, Stack, StackError,
};
use rigforge_test_fixtures::MemoryScene;

const EMITTER: &str = "Utility : Emitter";

struct Emitter {
    core: ComponentCore,
}

impl Emitter {
    fn new() -> Result<Self, StackError> {
        let mut core = ComponentCore::new(EMITTER);
        core.declare_input("Name", DeclareOpts::default())?;
        core.declare_input("Parent", DeclareOpts::optional())?;
        core.declare_output("Node", DeclareOpts::optional())?;
        Ok(Emitter { core })
    }
}

impl Component for Emitter {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
        self.core.reset_previous_build(ctx.scene)?;
        let name = self
            .core
            .input("Name")
            .map(|a| a.value())
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_else(|| "emitter".to_string());
        let node = ctx.scene.create_node("transform", &name)?;
        self.core.record_build_nodes(std::slice::from_ref(&node));
        self.core.set_output("Node", Value::node(node))?;
        Ok(())
    }
}

fn chained_stack(reg: &Registry, size: usize) -> Stack {
    let mut stack = Stack::new(Config::default());
    for i in 0..size {
        let at = stack.add(reg, EMITTER, None, None).unwrap();
        let core = stack.component_mut(at).unwrap().core_mut();
        core.input_mut("Name")
            .unwrap()
            .set(Value::text(format!("node_{i}")));
        if i > 0 {
            core.input_mut("Parent")
                .unwrap()
                .set_address(Address::parse(&format!("{}.Node", i - 1)).unwrap());
        }
    }
    stack
}

fn bench_build(c: &mut Criterion) {
    let mut reg = Registry::new();
    reg.register(EMITTER, || Ok(Box::new(Emitter::new()?) as Box<dyn Component>));

    for size in [10usize, 100] {
        c.bench_function(&format!("build_chained_{size}"), |b| {
            b.iter_batched(
                || (chained_stack(&reg, size), MemoryScene::new()),
                |(mut stack, mut scene)| stack.build(&reg, &mut scene),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
