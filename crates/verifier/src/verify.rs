use std::collections::VecDeque;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use dexopt_ir::{
    BlockId, InstData, InstId, Method, MethodRef, MethodWriter, Program, SymbolTable,
};

use crate::{
    diagnostic::{Diagnostic, DiagnosticCode, Location},
    report::VerificationReport,
    VerifierConfig,
};

pub fn verify_program(program: &Program, cfg: &VerifierConfig) -> VerificationReport {
    let mut report = VerificationReport::default();

    let mut method_reports: Vec<_> = program
        .bodies
        .keys()
        .into_par_iter()
        .map(|method_ref| {
            let method_report = program
                .bodies
                .view(method_ref, |method| {
                    if method.method_ref != method_ref {
                        let mut report = VerificationReport::default();
                        report.push(
                            Diagnostic::error(
                                DiagnosticCode::InvalidMethodRef,
                                "body is stored under another method",
                                Location::Method(method_ref),
                            )
                            .with_note(format!(
                                "body belongs to method{}",
                                method.method_ref.as_u32()
                            )),
                            cfg.max_diagnostics,
                        );
                        return report;
                    }
                    verify_method(&program.symbols, method, cfg)
                })
                .unwrap_or_default();
            (method_ref, method_report)
        })
        .collect();

    method_reports.sort_by_key(|(method_ref, _)| *method_ref);
    for (_, method_report) in method_reports {
        report.extend_with_limit(method_report.diagnostics, cfg.max_diagnostics);
        if report.is_full(cfg.max_diagnostics) {
            break;
        }
    }

    report
}

pub fn verify_method(
    symbols: &SymbolTable,
    method: &Method,
    cfg: &VerifierConfig,
) -> VerificationReport {
    let mut verifier = MethodVerifier::new(symbols, method, cfg);
    verifier.run();
    verifier.report
}

pub fn verify_method_or_panic(symbols: &SymbolTable, method: &Method, cfg: &VerifierConfig) {
    let report = verify_method(symbols, method, cfg);
    if report.has_errors() {
        eprintln!("{}", MethodWriter::new(symbols, method));
        eprintln!("{report}");
        panic!("DEXOPT_IR_VERIFY_FAILURE");
    }
}

struct MethodVerifier<'a> {
    symbols: &'a SymbolTable,
    method: &'a Method,
    cfg: &'a VerifierConfig,
    report: VerificationReport,
}

impl<'a> MethodVerifier<'a> {
    fn new(symbols: &'a SymbolTable, method: &'a Method, cfg: &'a VerifierConfig) -> Self {
        Self {
            symbols,
            method,
            cfg,
            report: VerificationReport::default(),
        }
    }

    fn run(&mut self) {
        self.check_frame();

        if self.method.layout.entry_block().is_none() {
            self.emit(Diagnostic::error(
                DiagnosticCode::MissingEntryBlock,
                "method has no entry block",
                self.method_loc(),
            ));
            return;
        }

        self.scan_layout();
        self.check_insts();
        if self.cfg.should_report_unreachable() {
            self.check_reachability();
        }
    }

    fn check_frame(&mut self) {
        let method = self.method;

        if method.registers_size > self.cfg.max_registers {
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::FrameExceedsLimit,
                    "register frame exceeds the limit",
                    self.method_loc(),
                )
                .with_note(format!(
                    "{} registers, limit {}",
                    method.registers_size, self.cfg.max_registers
                )),
            );
        }

        if method.ins_size > method.registers_size {
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::InvalidInsSize,
                    "parameters do not fit in the register frame",
                    self.method_loc(),
                )
                .with_note(format!(
                    "ins={} regs={}",
                    method.ins_size, method.registers_size
                )),
            );
        } else if self.cfg.should_check_signatures() {
            let expected = self.symbols.method(method.method_ref).arg_width();
            if method.ins_size != expected {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::InvalidInsSize,
                        "parameter registers disagree with the signature",
                        self.method_loc(),
                    )
                    .with_note(format!("ins={} expected={expected}", method.ins_size)),
                );
            }
        }
    }

    fn scan_layout(&mut self) {
        let method = self.method;

        for block in method.layout.iter_block() {
            let insts: SmallVec<[InstId; 16]> = method.layout.iter_inst(block).collect();
            let Some((&last, init)) = insts.split_last() else {
                self.emit(Diagnostic::error(
                    DiagnosticCode::EmptyBlock,
                    "block has no instructions",
                    self.block_loc(block),
                ));
                continue;
            };

            for &inst in init {
                if method.inst(inst).is_terminator() {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::TerminatorNotLast,
                            "terminator is followed by other instructions",
                            self.inst_loc(block, inst),
                        )
                        .with_snippet(self.inst_text(inst)),
                    );
                }
            }

            let last_data = method.inst(last);
            if !last_data.is_terminator() {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::MissingTerminator,
                        "block does not end in a terminator",
                        self.block_loc(block),
                    )
                    .with_snippet(self.inst_text(last)),
                );
            }

            for dest in last_data.branch_dests() {
                if !method.layout.is_block_inserted(dest) {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::BranchToMissingBlock,
                            "branch targets a block that is not in the layout",
                            self.inst_loc(block, last),
                        )
                        .with_note(format!("target {dest}")),
                    );
                }
            }
        }
    }

    fn check_insts(&mut self) {
        let method = self.method;

        for block in method.layout.iter_block() {
            for inst in method.layout.iter_inst(block) {
                let data = method.inst(inst);

                let mut out_of_frame: SmallVec<[_; 2]> = data
                    .defs()
                    .into_iter()
                    .chain(data.uses())
                    .filter(|reg| reg.as_u16() >= method.registers_size)
                    .collect();
                out_of_frame.dedup();
                for reg in out_of_frame {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::RegisterOutOfFrame,
                            "register is outside the frame",
                            self.inst_loc(block, inst),
                        )
                        .with_note(format!("{reg} in a frame of {}", method.registers_size))
                        .with_snippet(self.inst_text(inst)),
                    );
                }

                if let InstData::Invoke {
                    method: callee,
                    args,
                    ..
                } = data
                {
                    if !self.cfg.should_check_signatures() {
                        continue;
                    }
                    let expected = self.symbols.method(*callee).arg_width() as usize;
                    if args.len() != expected {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::InvokeArityMismatch,
                                "invocation passes the wrong number of argument registers",
                                self.inst_loc(block, inst),
                            )
                            .with_note(format!("expected {expected}, found {}", args.len()))
                            .with_snippet(self.inst_text(inst)),
                        );
                    }
                }
            }
        }
    }

    fn check_reachability(&mut self) {
        let method = self.method;
        let Some(entry) = method.layout.entry_block() else {
            return;
        };

        let mut reachable = FxHashSet::default();
        let mut worklist = VecDeque::from([entry]);
        reachable.insert(entry);
        while let Some(block) = worklist.pop_front() {
            let Some(last) = method.layout.last_inst_of(block) else {
                continue;
            };
            for dest in method.inst(last).branch_dests() {
                if method.layout.is_block_inserted(dest) && reachable.insert(dest) {
                    worklist.push_back(dest);
                }
            }
        }

        for block in method.layout.iter_block() {
            if !reachable.contains(&block) {
                self.emit(Diagnostic::warning(
                    DiagnosticCode::UnreachableBlock,
                    "block is unreachable from the entry",
                    self.block_loc(block),
                ));
            }
        }
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        self.report.push(diagnostic, self.cfg.max_diagnostics);
    }

    fn inst_text(&self, inst: InstId) -> Option<String> {
        let mut text = String::new();
        MethodWriter::new(self.symbols, self.method)
            .write_inst(inst, &mut text)
            .ok()
            .map(|_| text)
    }

    fn method_ref(&self) -> MethodRef {
        self.method.method_ref
    }

    fn method_loc(&self) -> Location {
        Location::Method(self.method_ref())
    }

    fn block_loc(&self, block: BlockId) -> Location {
        Location::Block {
            method: self.method_ref(),
            block,
        }
    }

    fn inst_loc(&self, block: BlockId, inst: InstId) -> Location {
        Location::Inst {
            method: self.method_ref(),
            block,
            inst,
        }
    }
}
