use dexopt_ir::{
    builder::test_util::*, CmpOp, InstData, InvokeKind, Method, MethodRef, Program, Reg,
    ValueKind,
};
use dexopt_verifier::{
    verify_method, verify_program, DiagnosticCode, Severity, VerificationLevel,
    VerificationReport, VerifierConfig,
};

fn has_code(report: &VerificationReport, code: DiagnosticCode) -> bool {
    report
        .diagnostics
        .iter()
        .any(|diagnostic| diagnostic.code == code)
}

fn full() -> VerifierConfig {
    VerifierConfig::for_level(VerificationLevel::Full)
}

fn straight_line(sig: MethodRef, regs: u16) -> Method {
    let mut b = MethodBuilder::new(sig, regs, 0);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.const_narrow(Reg(0), 1);
    b.ret(ValueKind::Narrow, Reg(0));
    b.build()
}

#[test]
fn valid_method_is_ok() {
    let (symbols, sig) = test_symbols();
    let report = verify_method(&symbols, &straight_line(sig, 1), &full());
    assert!(report.is_ok(), "expected no verifier errors, got {report}");
    assert!(report.diagnostics.is_empty());
}

#[test]
fn missing_entry_block_is_reported() {
    let (symbols, sig) = test_symbols();
    let method = Method::new(sig, 1, 0);
    let report = verify_method(&symbols, &method, &full());
    assert!(has_code(&report, DiagnosticCode::MissingEntryBlock));
}

#[test]
fn block_shape_errors_are_reported() {
    let (symbols, sig) = test_symbols();
    let mut b = MethodBuilder::new(sig, 2, 0);
    let [b0, b1, _b2] = [(); 3].map(|_| b.append_block());
    b.switch_to_block(b0);
    b.jump(b1);
    b.const_narrow(Reg(0), 1);
    b.switch_to_block(b1);
    b.const_narrow(Reg(1), 2);
    let method = b.build();

    let report = verify_method(&symbols, &method, &full());
    assert!(has_code(&report, DiagnosticCode::TerminatorNotLast));
    assert!(has_code(&report, DiagnosticCode::MissingTerminator));
    assert!(has_code(&report, DiagnosticCode::EmptyBlock));
}

#[test]
fn branch_to_detached_block_is_reported() {
    let (symbols, sig) = test_symbols();
    let mut b = MethodBuilder::new(sig, 1, 0);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.const_narrow(Reg(0), 0);
    let detached = b.method.make_block();
    b.branch(CmpOp::Eq, &[Reg(0)], detached, detached);
    let method = b.build();

    let report = verify_method(&symbols, &method, &full());
    assert!(has_code(&report, DiagnosticCode::BranchToMissingBlock));
}

#[test]
fn register_and_frame_errors_are_reported() {
    let (mut symbols, sig) = test_symbols();
    let class = symbols.lookup_type("LTest;").unwrap();
    let callee = symbols.make_method(class, "two", &[ValueKind::Wide], None, true);

    let mut b = MethodBuilder::new(sig, 17, 0);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.const_wide(Reg(16), 3);
    b.invoke(InvokeKind::Static, callee, &[Reg(0)]);
    b.ret_void();
    let method = b.build();

    let report = verify_method(&symbols, &method, &full());
    assert!(has_code(&report, DiagnosticCode::FrameExceedsLimit));
    assert!(has_code(&report, DiagnosticCode::RegisterOutOfFrame));
    assert!(has_code(&report, DiagnosticCode::InvokeArityMismatch));

    // Signature checks are skipped at the fast level.
    let fast = VerifierConfig::for_level(VerificationLevel::Fast);
    let report = verify_method(&symbols, &method, &fast);
    assert!(!has_code(&report, DiagnosticCode::InvokeArityMismatch));
    assert!(has_code(&report, DiagnosticCode::RegisterOutOfFrame));
}

#[test]
fn ins_size_must_match_signature() {
    let (symbols, sig) = test_symbols();
    let mut b = MethodBuilder::new(sig, 2, 1);
    let b0 = b.append_block();
    b.switch_to_block(b0);
    b.ret_void();
    let method = b.build();

    let report = verify_method(&symbols, &method, &full());
    assert!(has_code(&report, DiagnosticCode::InvalidInsSize));
}

#[test]
fn unreachable_block_is_a_warning() {
    let (symbols, sig) = test_symbols();
    let mut b = MethodBuilder::new(sig, 1, 0);
    let [b0, b1] = [(); 2].map(|_| b.append_block());
    b.switch_to_block(b0);
    b.ret_void();
    b.switch_to_block(b1);
    b.ret_void();
    let method = b.build();

    let report = verify_method(&symbols, &method, &full());
    assert!(report.is_ok());
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, DiagnosticCode::UnreachableBlock);
    assert_eq!(warnings[0].severity, Severity::Warning);

    let standard = VerifierConfig::default();
    assert!(verify_method(&symbols, &method, &standard)
        .diagnostics
        .is_empty());
}

#[test]
fn program_reports_are_ordered_and_limited() {
    let (mut symbols, sig) = test_symbols();
    let class = symbols.lookup_type("LTest;").unwrap();
    let other = symbols.make_method(class, "other", &[], None, true);

    let mut broken = Method::new(other, 1, 0);
    let block = broken.make_block();
    broken.layout.append_block(block);
    let inst = broken.make_inst(InstData::make_zero(ValueKind::Narrow, Reg(3)));
    broken.layout.append_inst(inst, block);

    let valid = straight_line(sig, 1);
    let program = Program::new(symbols);
    program.bodies.insert(valid);
    program.bodies.insert(broken);

    let report = verify_program(&program, &full());
    let codes: Vec<_> = report.errors().map(|diag| diag.code).collect();
    assert_eq!(
        codes,
        [
            DiagnosticCode::MissingTerminator,
            DiagnosticCode::RegisterOutOfFrame
        ]
    );

    let mut limited = full();
    limited.max_diagnostics = 1;
    assert_eq!(verify_program(&program, &limited).diagnostics.len(), 1);
}
