pub mod dataflow;
pub mod regset;
pub mod remove_builders;

pub use remove_builders::{
    BuilderDescriptor, BuilderRemover, RemoveBuilderError, RemoveBuilders, RemoveBuildersConfig,
    RemoveBuildersStats, RemoveSummary,
};
