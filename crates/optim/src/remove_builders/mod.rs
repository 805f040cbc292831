//! Builder-pattern elimination.
//!
//! A builder is a transient helper object whose fields are written, read
//! back (typically by its `build` method) and then dropped. When every field
//! read can be traced back to the register that was stored into the field,
//! the builder allocation, its constructor call and all its field accesses
//! are replaced with register moves:
//!
//! ```text
//! new-instance v0, LFooBuilder;          const v3, 0          # only if needed
//! invoke-direct {v0}, LFooBuilder;.<init>
//! iput v1, v0, LFooBuilder;.x      =>
//! iget v2, v0, LFooBuilder;.x            move v2, v1
//! ```
//!
//! The transformation is all-or-nothing: it runs on a private copy of the
//! method which replaces the original only on success.
mod commit;
mod driver;
mod inline;
mod lattice;
mod planner;
mod regframe;
mod tainted;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, debug_span};

use dexopt_ir::{
    symbols::BUILD_METHOD_NAME, ControlFlowGraph, EditError, FieldRef, InstData, InstId, Method,
    MethodRef, SymbolTable, TypeRef,
};

pub use commit::commit;
pub use driver::{AbortKind, RemoveBuilders, RemoveBuildersStats};
pub use inline::{inline_call, InlineError};
pub use lattice::{FieldValue, FieldValueAnalysis, FieldsRegs};
pub use planner::{PlannedMove, PlannedReg, Planner, RewritePlan};
pub use regframe::{enlarge_frame, grown_size, FrameError, MAX_REGISTERS};
pub use tainted::{BuilderRefs, TaintState, TaintedRegs};

use crate::dataflow::ForwardSolver;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoveBuilderError {
    #[error(
        "expected at most one builder instance, found {build_calls} build call(s) and \
         {allocations} allocation(s)"
    )]
    MultipleBuilderInstances {
        build_calls: usize,
        allocations: usize,
    },

    #[error("failed to inline the build method")]
    InlineFailed(#[from] InlineError),

    #[error("builder reference escapes at `{0}`")]
    BuilderEscapes(InstId),

    #[error("field read `{0}` has no unique source register")]
    AmbiguousFieldValue(InstId),

    #[error("field read `{0}` needs a bridge but its originating write is not unique")]
    UnresolvedOriginatingWrite(InstId),

    #[error("not enough registers for the rewrite")]
    RegisterBudgetExceeded(#[from] FrameError),

    #[error("failed to apply the rewrite")]
    Commit(#[from] EditError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveBuildersConfig {
    /// Inline the single `build` call before the analysis.
    pub inline_build: bool,

    /// Largest `build` body, in instructions, that is inlined.
    pub max_inline_insts: usize,

    /// Reject methods in which a builder reference escapes. Disable only when
    /// escapes are ruled out by the caller.
    pub check_escapes: bool,
}

impl Default for RemoveBuildersConfig {
    fn default() -> Self {
        Self {
            inline_build: true,
            max_inline_insts: 32,
            check_escapes: true,
        }
    }
}

/// The builder type targeted for elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderDescriptor {
    pub ty: TypeRef,
    pub fields: SmallVec<[FieldRef; 8]>,
    pub build_method: Option<MethodRef>,
}

impl BuilderDescriptor {
    pub fn from_class(symbols: &SymbolTable, ty: TypeRef) -> Self {
        Self {
            ty,
            fields: symbols.fields_of(ty).into(),
            build_method: symbols.find_method(ty, BUILD_METHOD_NAME),
        }
    }

    pub fn field_index(&self, field: FieldRef) -> Option<usize> {
        self.fields.iter().position(|&f| f == field)
    }

    pub fn is_constructor(&self, symbols: &SymbolTable, method: MethodRef) -> bool {
        symbols.method(method).class == self.ty && symbols.is_constructor(method)
    }

    pub fn is_build_call(&self, data: &InstData) -> bool {
        self.build_method.is_some() && data.invoked() == self.build_method
    }

    pub fn is_allocation(&self, data: &InstData) -> bool {
        matches!(data, InstData::NewInstance { ty, .. } if *ty == self.ty)
    }
}

/// What a successful rewrite did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveSummary {
    pub inlined: bool,
    pub rounds: usize,
    pub extra_regs: u16,
    pub inserted: usize,
    pub removed: usize,
}

/// Removes one builder type from methods.
pub struct BuilderRemover<'a> {
    symbols: &'a SymbolTable,
    builder: &'a BuilderDescriptor,
    build_body: Option<&'a Method>,
    config: RemoveBuildersConfig,
}

impl<'a> BuilderRemover<'a> {
    pub fn new(symbols: &'a SymbolTable, builder: &'a BuilderDescriptor) -> Self {
        Self {
            symbols,
            builder,
            build_body: None,
            config: RemoveBuildersConfig::default(),
        }
    }

    pub fn with_build_body(mut self, body: &'a Method) -> Self {
        self.build_body = Some(body);
        self
    }

    pub fn with_config(mut self, config: RemoveBuildersConfig) -> Self {
        self.config = config;
        self
    }

    /// Eliminates the builder from `method`.
    ///
    /// On error `method` is left exactly as it was.
    pub fn plan_and_apply(&self, method: &mut Method) -> Result<RemoveSummary, RemoveBuilderError> {
        let span = debug_span!(
            target: "dexopt::remove_builders",
            "remove_builder",
            method = %self.symbols.method(method.method_ref).name,
            builder = %self.symbols.display_type(self.builder.ty),
        );
        let _enter = span.enter();

        let mut working = method.clone();
        match self.transform(&mut working) {
            Ok(summary) => {
                debug!(
                    target: "dexopt::remove_builders",
                    removed = summary.removed,
                    inserted = summary.inserted,
                    extra_regs = summary.extra_regs,
                    "builder removed"
                );
                *method = working;
                Ok(summary)
            }
            Err(err) => {
                debug!(target: "dexopt::remove_builders", reason = %err, "builder kept");
                Err(err)
            }
        }
    }

    fn transform(&self, method: &mut Method) -> Result<RemoveSummary, RemoveBuilderError> {
        let mut summary = RemoveSummary::default();

        let mut build_calls = SmallVec::<[InstId; 2]>::new();
        let mut allocations = 0;
        for inst in method.layout.iter_all_inst() {
            let data = method.inst(inst);
            if self.builder.is_build_call(data) {
                build_calls.push(inst);
            } else if self.builder.is_allocation(data) {
                allocations += 1;
            }
        }
        if build_calls.len() > 1 || allocations > 1 {
            return Err(RemoveBuilderError::MultipleBuilderInstances {
                build_calls: build_calls.len(),
                allocations,
            });
        }

        if let (Some(&call), true) = (build_calls.first(), self.config.inline_build) {
            let callee = self.build_body.ok_or(InlineError::NoBody)?;
            inline_call(
                self.symbols,
                method,
                call,
                callee,
                self.config.max_inline_insts,
            )?;
            summary.inlined = true;
        }

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(method);

        let refs = BuilderRefs::compute(self.symbols, method, &cfg, self.builder);
        if self.config.check_escapes {
            refs.check()?;
        }

        let analysis = FieldValueAnalysis::new(self.builder);
        let mut solver = ForwardSolver::new();
        solver.compute(method, &cfg, &analysis);
        summary.rounds = solver.rounds();

        let plan = Planner::new(self.symbols, self.builder).plan(method, &solver, &analysis, &refs)?;
        grown_size(method.registers_size, plan.extra_regs)?;
        summary.extra_regs = plan.extra_regs;

        let flushed = commit(method, plan)?;
        summary.inserted = flushed.inserted;
        summary.removed = flushed.removed;

        debug_assert!(
            !self.config.check_escapes || !method.mentions_type(self.symbols, self.builder.ty),
            "builder survived its removal"
        );
        Ok(summary)
    }
}
