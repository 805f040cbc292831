use cranelift_entity::EntityRef;
use dexopt_ir::{
    builder::test_util::*, BlockId, CmpOp, FieldRef, InstData, InvokeKind, Method, MethodRef,
    Program, Reg, SymbolTable, TypeRef, ValueKind,
};
use dexopt_optim::{
    remove_builders::{AbortKind, FrameError, InlineError},
    BuilderDescriptor, BuilderRemover, RemoveBuilderError, RemoveBuilders, RemoveBuildersConfig,
    RemoveSummary,
};
use dexopt_verifier::{verify_method, VerificationLevel, VerifierConfig};

struct Fixture {
    symbols: SymbolTable,
    test: MethodRef,
    foo: TypeRef,
    foo_init: MethodRef,
    builder: TypeRef,
    x: FieldRef,
    y: FieldRef,
    name: FieldRef,
    init: MethodRef,
    build: MethodRef,
    consume: MethodRef,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();

    let (mut symbols, test) = test_symbols();
    let foo = symbols.make_type("LFoo;");
    let foo_init = symbols.make_method(foo, "<init>", &[ValueKind::Narrow], None, false);
    let builder = symbols.make_type("LFooBuilder;");
    let x = symbols.make_field(builder, "x", ValueKind::Narrow);
    let y = symbols.make_field(builder, "y", ValueKind::Wide);
    let name = symbols.make_field(builder, "name", ValueKind::Object);
    let init = symbols.make_method(builder, "<init>", &[], None, false);
    let build = symbols.make_method(builder, "build", &[], Some(ValueKind::Object), false);
    let sink = symbols.make_type("LSink;");
    let consume = symbols.make_method(sink, "consume", &[ValueKind::Object], None, true);

    Fixture {
        symbols,
        test,
        foo,
        foo_init,
        builder,
        x,
        y,
        name,
        init,
        build,
        consume,
    }
}

impl Fixture {
    fn descriptor(&self) -> BuilderDescriptor {
        BuilderDescriptor::from_class(&self.symbols, self.builder)
    }

    /// `return new Foo(this.x)`
    fn build_body(&self) -> Method {
        let mut b = MethodBuilder::new(self.build, 3, 1);
        let b0 = b.append_block();
        b.switch_to_block(b0);
        b.new_instance(Reg(0), self.foo);
        b.field_get(ValueKind::Narrow, Reg(1), Reg(2), self.x);
        b.invoke(InvokeKind::Direct, self.foo_init, &[Reg(0), Reg(1)]);
        b.ret(ValueKind::Object, Reg(0));
        b.build()
    }

    /// Starts a method whose entry block allocates the builder into `v0`.
    fn begin(&self, method: MethodRef, regs: u16, ins: u16) -> MethodBuilder {
        let mut b = MethodBuilder::new(method, regs, ins);
        let b0 = b.append_block();
        b.switch_to_block(b0);
        b.new_instance(Reg(0), self.builder);
        b.invoke(InvokeKind::Direct, self.init, &[Reg(0)]);
        b
    }

    fn remove(&self, method: &mut Method) -> Result<RemoveSummary, RemoveBuilderError> {
        let desc = self.descriptor();
        let body = self.build_body();
        BuilderRemover::new(&self.symbols, &desc)
            .with_build_body(&body)
            .plan_and_apply(method)
    }

    fn dump(&self, method: &Method) -> String {
        dump_method(&self.symbols, method)
    }

    /// Checks that a rewritten method is well formed and free of the builder.
    fn assert_clean(&self, method: &Method) {
        let cfg = VerifierConfig::for_level(VerificationLevel::Full);
        let report = verify_method(&self.symbols, method, &cfg);
        assert!(report.is_ok(), "{report}\n{}", self.dump(method));
        assert!(!method.mentions_type(&self.symbols, self.builder));
    }

    /// Checks that the rewrite fails with `expected` and leaves `method` as it
    /// was.
    fn assert_kept(&self, mut method: Method, expected: RemoveBuilderError) {
        let before = self.dump(&method);
        assert_eq!(self.remove(&mut method), Err(expected));
        assert_eq!(self.dump(&method), before);
    }
}

#[test]
fn straight_line_builder_is_inlined_and_removed() {
    let f = fixture();
    let mut b = f.begin(f.test, 3, 0);
    b.const_narrow(Reg(1), 7);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.invoke(InvokeKind::Virtual, f.build, &[Reg(0)]);
    b.move_result(ValueKind::Object, Reg(2));
    b.ret(ValueKind::Object, Reg(2));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert!(summary.inlined);
    assert_eq!(summary.extra_regs, 0);
    assert_eq!((summary.inserted, summary.removed), (1, 5));

    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=6 ins=0 {
        block0:
            const v1, 7
            new-instance v3, LFoo;
            move v4, v1
            invoke-direct {v3, v4}, LFoo;.<init>
            move-object v2, v3
            return-object v2
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn overwritten_source_is_bridged() {
    let f = fixture();
    let mut b = f.begin(f.test, 4, 0);
    b.const_narrow(Reg(1), 7);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.const_narrow(Reg(1), 9);
    b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(2));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert!(!summary.inlined);
    assert_eq!(summary.extra_regs, 1);

    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=5 ins=0 {
        block0:
            const v1, 7
            move v4, v1
            const v1, 9
            move v2, v4
            return v2
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn overwriting_the_upper_half_bridges_wide_values() {
    let f = fixture();
    let mut b = f.begin(f.test, 5, 0);
    b.const_wide(Reg(1), 7);
    b.field_put(ValueKind::Wide, Reg(1), Reg(0), f.y);
    b.const_narrow(Reg(2), 0);
    b.field_get(ValueKind::Wide, Reg(3), Reg(0), f.y);
    b.ret(ValueKind::Wide, Reg(3));
    let mut method = b.build();

    f.remove(&mut method).unwrap();
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=7 ins=0 {
        block0:
            const-wide v1, 7
            move-wide v5, v1
            const v2, 0
            move-wide v3, v5
            return-wide v3
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn unset_fields_read_as_zero() {
    let f = fixture();
    let mut b = f.begin(f.test, 3, 0);
    b.field_get(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.field_get(ValueKind::Object, Reg(2), Reg(0), f.name);
    b.ret(ValueKind::Object, Reg(2));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    // Narrow and object reads share one zero register.
    assert_eq!(summary.extra_regs, 1);
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=4 ins=0 {
        block0:
            const v3, 0
            move v1, v3
            move-object v2, v3
            return-object v2
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn unread_field_write_is_dropped() {
    let f = fixture();
    let mut b = f.begin(f.test, 4, 0);
    b.const_narrow(Reg(3), 1);
    b.field_put(ValueKind::Narrow, Reg(3), Reg(0), f.x);
    b.field_get(ValueKind::Wide, Reg(1), Reg(0), f.y);
    b.ret(ValueKind::Wide, Reg(1));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert_eq!(summary.extra_regs, 2);
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=6 ins=0 {
        block0:
            const-wide v4, 0
            const v3, 1
            move-wide v1, v4
            return-wide v1
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn parameters_move_above_new_registers() {
    let mut f = fixture();
    let class = f.symbols.lookup_type("LTest;").unwrap();
    let with_arg = f
        .symbols
        .make_method(class, "withArg", &[ValueKind::Narrow], Some(ValueKind::Narrow), true);

    // v0 builder, v1 local, v2 argument.
    let mut b = f.begin(with_arg, 3, 1);
    b.field_put(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.const_narrow(Reg(2), 0);
    b.field_get(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(1));
    let mut method = b.build();

    f.remove(&mut method).unwrap();
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.withArg regs=4 ins=1 {
        block0:
            move v2, v3
            const v3, 0
            move v1, v2
            return v1
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn value_surviving_a_loop_is_moved_directly() {
    let f = fixture();
    let mut b = f.begin(f.test, 4, 0);
    let [b1, b2, b3] = [(); 3].map(|_| b.append_block());
    b.const_narrow(Reg(1), 5);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.jump(b1);
    b.switch_to_block(b1);
    b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.branch(CmpOp::Eq, &[Reg(2)], b2, b3);
    b.switch_to_block(b2);
    b.const_narrow(Reg(3), 1);
    b.jump(b1);
    b.switch_to_block(b3);
    b.ret(ValueKind::Narrow, Reg(2));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert!(summary.rounds <= 4 * 5);
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=4 ins=0 {
        block0:
            const v1, 5
            goto block1
        block1:
            move v2, v1
            if-eqz v2, block2, block3
        block2:
            const v3, 1
            goto block1
        block3:
            return v2
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn value_overwritten_in_a_loop_is_bridged() {
    let f = fixture();
    let mut b = f.begin(f.test, 4, 0);
    let [b1, b2, b3] = [(); 3].map(|_| b.append_block());
    b.const_narrow(Reg(1), 5);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.jump(b1);
    b.switch_to_block(b1);
    b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.branch(CmpOp::Eq, &[Reg(2)], b2, b3);
    b.switch_to_block(b2);
    b.const_narrow(Reg(1), 1);
    b.jump(b1);
    b.switch_to_block(b3);
    b.ret(ValueKind::Narrow, Reg(2));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert!(summary.rounds <= 4 * 5);
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=5 ins=0 {
        block0:
            const v1, 5
            move v4, v1
            goto block1
        block1:
            move v2, v4
            if-eqz v2, block2, block3
        block2:
            const v1, 1
            goto block1
        block3:
            return v2
    }
    ");
    f.assert_clean(&method);
}

/// Entry, two arms writing `x` from `then_src` and `else_src`, and a join
/// that reads `x` after running `after_join`.
fn diamond(
    f: &Fixture,
    then_src: Reg,
    else_src: Reg,
    after_join: impl FnOnce(&mut MethodBuilder),
) -> Method {
    let mut b = f.begin(f.test, 5, 0);
    let [b1, b2, b3] = [(); 3].map(|_| b.append_block());
    b.const_narrow(Reg(4), 0);
    b.branch(CmpOp::Eq, &[Reg(4)], b1, b2);
    for (block, src) in [(b1, then_src), (b2, else_src)] {
        b.switch_to_block(block);
        b.const_narrow(src, 1);
        b.field_put(ValueKind::Narrow, src, Reg(0), f.x);
        b.jump(b3);
    }
    b.switch_to_block(b3);
    after_join(&mut b);
    b.field_get(ValueKind::Narrow, Reg(3), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(3));
    b.build()
}

#[test]
fn same_register_on_both_paths_is_moved_directly() {
    let f = fixture();
    let mut method = diamond(&f, Reg(1), Reg(1), |_| {});

    let summary = f.remove(&mut method).unwrap();
    assert_eq!(summary.extra_regs, 0);
    f.assert_clean(&method);
    assert!(f.dump(&method).contains("move v3, v1"));
}

#[test]
fn divergent_writes_are_ambiguous() {
    let f = fixture();
    let method = diamond(&f, Reg(1), Reg(2), |_| {});
    let read = method.layout.iter_all_inst().find(|&inst| {
        matches!(method.inst(inst), InstData::FieldGet { .. })
    });
    f.assert_kept(
        method,
        RemoveBuilderError::AmbiguousFieldValue(read.unwrap()),
    );
}

#[test]
fn write_on_one_path_only_is_ambiguous() {
    let f = fixture();
    let mut b = f.begin(f.test, 4, 0);
    let [b1, b2] = [(); 2].map(|_| b.append_block());
    b.const_narrow(Reg(1), 0);
    b.branch(CmpOp::Eq, &[Reg(1)], b1, b2);
    b.switch_to_block(b1);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.jump(b2);
    b.switch_to_block(b2);
    let read = b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(2));

    f.assert_kept(b.build(), RemoveBuilderError::AmbiguousFieldValue(read));
}

#[test]
fn bridge_without_unique_write_is_unresolved() {
    let f = fixture();
    let method = diamond(&f, Reg(1), Reg(1), |b| {
        b.const_narrow(Reg(1), 2);
    });
    let read = method.layout.iter_all_inst().find(|&inst| {
        matches!(method.inst(inst), InstData::FieldGet { .. })
    });
    f.assert_kept(
        method,
        RemoveBuilderError::UnresolvedOriginatingWrite(read.unwrap()),
    );
}

/// One action on a path between the builder's allocation and the read of `x`.
#[derive(Debug, Clone, Copy)]
enum Step {
    Nothing,
    /// `const vN, <fresh>` followed by `iput vN, x`.
    Store(u16),
    /// `const vN, <fresh>`.
    Clobber(u16),
}

const STEPS: [Step; 5] = [
    Step::Nothing,
    Step::Store(1),
    Step::Store(2),
    Step::Clobber(1),
    Step::Clobber(2),
];

fn emit_steps(f: &Fixture, b: &mut MethodBuilder, steps: &[Step], imm: &mut i64) {
    for &step in steps {
        match step {
            Step::Nothing => {}
            Step::Store(reg) => {
                *imm += 1;
                b.const_narrow(Reg(reg), *imm);
                b.field_put(ValueKind::Narrow, Reg(reg), Reg(0), f.x);
            }
            Step::Clobber(reg) => {
                *imm += 1;
                b.const_narrow(Reg(reg), *imm);
            }
        }
    }
}

/// Every sequence of two steps.
fn step_pairs() -> Vec<[Step; 2]> {
    STEPS
        .iter()
        .flat_map(|&a| STEPS.iter().map(move |&b| [a, b]))
        .collect()
}

/// Steps run right before the read of `x`.
const READ_PREFIXES: [Step; 2] = [Step::Nothing, Step::Clobber(1)];

/// Executes `method` along `path` and returns the returned value.
///
/// Builder fields are tracked as a single `x` slot; unset fields read as zero.
fn run_path(f: &Fixture, method: &Method, path: &[BlockId]) -> Option<i64> {
    let mut regs = vec![None; usize::from(method.registers_size)];
    let mut x = None;
    for &block in path {
        for inst in method.layout.iter_inst(block) {
            match *method.inst(inst) {
                InstData::Const { dest, imm, .. } => regs[dest.index()] = Some(imm),
                InstData::Move { dest, src, .. } => regs[dest.index()] = regs[src.index()],
                InstData::NewInstance { dest, .. } => regs[dest.index()] = Some(-1),
                InstData::FieldPut { src, field, .. } => {
                    assert_eq!(field, f.x);
                    x = regs[src.index()];
                }
                InstData::FieldGet { dest, field, .. } => {
                    assert_eq!(field, f.x);
                    regs[dest.index()] = Some(x.unwrap_or(0));
                }
                InstData::Return { src, .. } => return regs[src.index()],
                _ => {}
            }
        }
    }
    None
}

/// Rewrites `method` and checks that every path in `paths` returns the same
/// value before and after. Returns `true` if the builder was removed.
fn assert_same_results(f: &Fixture, mut method: Method, paths: &[Vec<BlockId>]) -> bool {
    let expected: Vec<_> = paths.iter().map(|path| run_path(f, &method, path)).collect();
    let before = f.dump(&method);

    match f.remove(&mut method) {
        Ok(_) => {
            f.assert_clean(&method);
            let found: Vec<_> = paths.iter().map(|path| run_path(f, &method, path)).collect();
            assert_eq!(found, expected, "\n{before}\n{}", f.dump(&method));
            true
        }
        Err(_) => {
            assert_eq!(f.dump(&method), before);
            false
        }
    }
}

#[test]
fn rewritten_diamonds_read_the_stored_value() {
    let f = fixture();
    let mut rewritten = 0;
    let pairs = step_pairs();
    let cases = pairs
        .iter()
        .flat_map(|&then| pairs.iter().map(move |&else_| (then, else_)));
    for ((then, else_), join) in cases.flat_map(|arms| READ_PREFIXES.map(|join| (arms, join))) {
        let mut imm = 100;
        let mut b = f.begin(f.test, 5, 0);
        let [b1, b2, b3] = [(); 3].map(|_| b.append_block());
        b.const_narrow(Reg(1), 10);
        b.const_narrow(Reg(2), 20);
        b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
        b.const_narrow(Reg(4), 0);
        b.branch(CmpOp::Eq, &[Reg(4)], b1, b2);
        for (block, steps) in [(b1, then), (b2, else_)] {
            b.switch_to_block(block);
            emit_steps(&f, &mut b, &steps, &mut imm);
            b.jump(b3);
        }
        b.switch_to_block(b3);
        emit_steps(&f, &mut b, &[join], &mut imm);
        b.field_get(ValueKind::Narrow, Reg(3), Reg(0), f.x);
        b.ret(ValueKind::Narrow, Reg(3));

        let b0 = BlockId::new(0);
        let paths = [vec![b0, b1, b3], vec![b0, b2, b3]];
        if assert_same_results(&f, b.build(), &paths) {
            rewritten += 1;
        }
    }
    assert!(rewritten > 0);
}

#[test]
fn rewritten_loops_read_the_stored_value() {
    let f = fixture();
    let mut rewritten = 0;
    let cases = step_pairs()
        .into_iter()
        .flat_map(|body| READ_PREFIXES.map(|exit| (body, exit)));
    for (body, exit) in cases {
        let mut imm = 100;
        let mut b = f.begin(f.test, 5, 0);
        let [b1, b2, b3] = [(); 3].map(|_| b.append_block());
        b.const_narrow(Reg(1), 10);
        b.const_narrow(Reg(2), 20);
        b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
        b.const_narrow(Reg(4), 0);
        b.jump(b1);
        b.switch_to_block(b1);
        b.branch(CmpOp::Eq, &[Reg(4)], b2, b3);
        b.switch_to_block(b2);
        emit_steps(&f, &mut b, &body, &mut imm);
        b.jump(b1);
        b.switch_to_block(b3);
        emit_steps(&f, &mut b, &[exit], &mut imm);
        b.field_get(ValueKind::Narrow, Reg(3), Reg(0), f.x);
        b.ret(ValueKind::Narrow, Reg(3));

        let b0 = BlockId::new(0);
        let paths: Vec<_> = (0..3)
            .map(|trips| {
                let mut path = vec![b0, b1];
                for _ in 0..trips {
                    path.extend([b2, b1]);
                }
                path.push(b3);
                path
            })
            .collect();
        if assert_same_results(&f, b.build(), &paths) {
            rewritten += 1;
        }
    }
    assert!(rewritten > 0);
}

#[test]
fn two_build_calls_are_rejected() {
    let f = fixture();
    let mut b = f.begin(f.test, 3, 0);
    b.invoke(InvokeKind::Virtual, f.build, &[Reg(0)]);
    b.move_result(ValueKind::Object, Reg(1));
    b.invoke(InvokeKind::Virtual, f.build, &[Reg(0)]);
    b.move_result(ValueKind::Object, Reg(2));
    b.ret_void();

    f.assert_kept(
        b.build(),
        RemoveBuilderError::MultipleBuilderInstances {
            build_calls: 2,
            allocations: 1,
        },
    );
}

#[test]
fn two_allocations_are_rejected() {
    let f = fixture();
    let mut b = f.begin(f.test, 2, 0);
    b.new_instance(Reg(1), f.builder);
    b.ret_void();

    f.assert_kept(
        b.build(),
        RemoveBuilderError::MultipleBuilderInstances {
            build_calls: 0,
            allocations: 2,
        },
    );
}

#[test]
fn escaping_builder_is_kept() {
    let f = fixture();
    let mut b = f.begin(f.test, 1, 0);
    let call = b.invoke(InvokeKind::Static, f.consume, &[Reg(0)]);
    b.ret_void();

    f.assert_kept(b.build(), RemoveBuilderError::BuilderEscapes(call));
}

#[test]
fn failed_inline_is_reported() {
    let f = fixture();
    let mut b = f.begin(f.test, 2, 0);
    b.invoke(InvokeKind::Virtual, f.build, &[Reg(0)]);
    b.move_result(ValueKind::Object, Reg(1));
    b.ret(ValueKind::Object, Reg(1));
    let mut method = b.build();
    let before = f.dump(&method);

    let desc = f.descriptor();
    let body = f.build_body();
    let config = RemoveBuildersConfig {
        max_inline_insts: 2,
        ..RemoveBuildersConfig::default()
    };
    let res = BuilderRemover::new(&f.symbols, &desc)
        .with_build_body(&body)
        .with_config(config)
        .plan_and_apply(&mut method);

    assert_eq!(
        res,
        Err(RemoveBuilderError::InlineFailed(InlineError::TooLarge {
            len: 4,
            max: 2
        }))
    );
    assert_eq!(f.dump(&method), before);
}

#[test]
fn register_budget_is_enforced() {
    let f = fixture();

    // The zero register does not fit.
    let mut b = f.begin(f.test, 16, 0);
    b.field_get(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(1));
    f.assert_kept(
        b.build(),
        RemoveBuilderError::RegisterBudgetExceeded(FrameError {
            current: 16,
            extra: 1,
        }),
    );

    // An oversized frame is rejected even when nothing is added.
    let mut b = f.begin(f.test, 17, 0);
    b.const_narrow(Reg(1), 3);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(2));
    f.assert_kept(
        b.build(),
        RemoveBuilderError::RegisterBudgetExceeded(FrameError {
            current: 17,
            extra: 0,
        }),
    );
}

#[test]
fn unreachable_reads_need_no_registers() {
    let f = fixture();
    let mut b = f.begin(f.test, 16, 0);
    let dead = b.append_block();
    b.const_narrow(Reg(1), 7);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.field_get(ValueKind::Narrow, Reg(2), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(2));
    b.switch_to_block(dead);
    b.field_get(ValueKind::Narrow, Reg(3), Reg(0), f.x);
    b.ret(ValueKind::Narrow, Reg(3));
    let mut method = b.build();

    let summary = f.remove(&mut method).unwrap();
    assert_eq!(summary.extra_regs, 0);
    insta::assert_snapshot!(f.dump(&method), @r"
    method LTest;.test regs=16 ins=0 {
        block0:
            const v1, 7
            move v2, v1
            return v2
        block1:
            return v3
    }
    ");
    f.assert_clean(&method);
}

#[test]
fn driver_rewrites_program() {
    let mut f = fixture();
    let class = f.symbols.lookup_type("LTest;").unwrap();
    let escapes = f.symbols.make_method(class, "escapes", &[], None, true);
    let unrelated = f.symbols.make_method(class, "unrelated", &[], None, true);

    let mut b = f.begin(f.test, 3, 0);
    b.const_narrow(Reg(1), 7);
    b.field_put(ValueKind::Narrow, Reg(1), Reg(0), f.x);
    b.invoke(InvokeKind::Virtual, f.build, &[Reg(0)]);
    b.move_result(ValueKind::Object, Reg(2));
    b.ret(ValueKind::Object, Reg(2));
    let test = b.build();

    let mut b = f.begin(escapes, 1, 0);
    b.invoke(InvokeKind::Static, f.consume, &[Reg(0)]);
    b.ret_void();
    let escaping = b.build();

    let mut b = MethodBuilder::new(unrelated, 1, 0);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.ret_void();
    let unrelated = b.build();

    let mut b = MethodBuilder::new(f.init, 1, 1);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.ret_void();
    let init = b.build();

    let build_body = f.build_body();
    let build_dump = f.dump(&build_body);
    let escaping_dump = f.dump(&escaping);

    let builder = f.builder;
    let symbols = std::mem::take(&mut f.symbols);
    let program = Program::new(symbols);
    for body in [test, escaping, unrelated, init, build_body] {
        program.bodies.insert(body);
    }

    let stats = RemoveBuilders::new(RemoveBuildersConfig::default()).run(&program, &[builder]);
    assert_eq!(stats.transformed, 1);
    assert_eq!(stats.aborted(), 1);
    assert_eq!(stats.aborts.get(&AbortKind::BuilderEscapes), Some(&1));

    let symbols = &program.symbols;
    program
        .bodies
        .view(f.test, |method| {
            assert!(!method.mentions_type(symbols, builder));
        })
        .unwrap();
    program
        .bodies
        .view(escapes, |method| {
            assert_eq!(dump_method(symbols, method), escaping_dump);
        })
        .unwrap();
    program
        .bodies
        .view(f.build, |method| {
            assert_eq!(dump_method(symbols, method), build_dump);
        })
        .unwrap();
}
