use std::{collections::BTreeMap, fmt, sync::Mutex};

use tracing::info;

use dexopt_ir::{Method, Program, TypeRef};

use super::{BuilderDescriptor, BuilderRemover, RemoveBuilderError, RemoveBuildersConfig};

/// Reason a method kept its builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbortKind {
    MultipleBuilderInstances,
    InlineFailed,
    BuilderEscapes,
    AmbiguousFieldValue,
    UnresolvedOriginatingWrite,
    RegisterBudgetExceeded,
    Commit,
}

impl From<&RemoveBuilderError> for AbortKind {
    fn from(err: &RemoveBuilderError) -> Self {
        match err {
            RemoveBuilderError::MultipleBuilderInstances { .. } => Self::MultipleBuilderInstances,
            RemoveBuilderError::InlineFailed(_) => Self::InlineFailed,
            RemoveBuilderError::BuilderEscapes(_) => Self::BuilderEscapes,
            RemoveBuilderError::AmbiguousFieldValue(_) => Self::AmbiguousFieldValue,
            RemoveBuilderError::UnresolvedOriginatingWrite(_) => Self::UnresolvedOriginatingWrite,
            RemoveBuilderError::RegisterBudgetExceeded(_) => Self::RegisterBudgetExceeded,
            RemoveBuilderError::Commit(_) => Self::Commit,
        }
    }
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveBuildersStats {
    /// Number of (method, builder) pairs rewritten.
    pub transformed: usize,
    pub aborts: BTreeMap<AbortKind, usize>,
}

impl RemoveBuildersStats {
    pub fn aborted(&self) -> usize {
        self.aborts.values().sum()
    }

    fn record(&mut self, res: &Result<(), RemoveBuilderError>) {
        match res {
            Ok(()) => self.transformed += 1,
            Err(err) => *self.aborts.entry(err.into()).or_default() += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.transformed += other.transformed;
        for (kind, count) in other.aborts {
            *self.aborts.entry(kind).or_default() += count;
        }
    }

    /// Adds a worker's counts to `shared`, even if another worker panicked
    /// while holding the lock.
    fn merge_shared(shared: &Mutex<Self>, local: Self) {
        shared
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .merge(local);
    }
}

/// Program-wide builder elimination.
pub struct RemoveBuilders {
    pub config: RemoveBuildersConfig,
}

impl RemoveBuilders {
    pub fn new(config: RemoveBuildersConfig) -> Self {
        Self { config }
    }

    /// Removes every type of `builders` from every method that uses it.
    ///
    /// Methods are processed in parallel. Methods declared on a builder type
    /// are left alone, so the `build` bodies read for inlining are the ones
    /// the program started with.
    pub fn run(&self, program: &Program, builders: &[TypeRef]) -> RemoveBuildersStats {
        let symbols = &program.symbols;
        let targets: Vec<(BuilderDescriptor, Option<Method>)> = builders
            .iter()
            .map(|&ty| {
                let desc = BuilderDescriptor::from_class(symbols, ty);
                let body = desc
                    .build_method
                    .and_then(|build| program.bodies.view(build, Method::clone));
                (desc, body)
            })
            .collect();

        let stats = Mutex::new(RemoveBuildersStats::default());
        program.bodies.par_for_each(|method_ref, method| {
            if builders.contains(&symbols.method(method_ref).class) {
                return;
            }

            let mut local = RemoveBuildersStats::default();
            for (desc, body) in &targets {
                if !method.mentions_type(symbols, desc.ty) {
                    continue;
                }

                let mut remover = BuilderRemover::new(symbols, desc).with_config(self.config);
                if let Some(body) = body {
                    remover = remover.with_build_body(body);
                }
                local.record(&remover.plan_and_apply(method).map(drop));
            }

            RemoveBuildersStats::merge_shared(&stats, local);
        });

        let stats = stats.into_inner().unwrap_or_else(|err| err.into_inner());
        info!(
            target: "dexopt::remove_builders",
            transformed = stats.transformed,
            aborted = stats.aborted(),
            "builder removal finished"
        );
        for (kind, count) in &stats.aborts {
            info!(target: "dexopt::remove_builders", %kind, count, "aborted");
        }
        stats
    }
}
