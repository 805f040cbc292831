pub mod builder;
pub mod cfg;
pub mod cursor;
pub mod edit;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod method;
pub mod program;
pub mod symbols;
pub mod types;

pub use builder::MethodBuilder;
pub use cfg::ControlFlowGraph;
pub use edit::{EditError, FlushSummary, MutationBuffer};
pub use inst::{BinaryOp, CmpOp, InstCategory, InstData, InstId, InvokeKind};
pub use ir_writer::MethodWriter;
pub use layout::Layout;
pub use method::{Block, BlockId, Method};
pub use program::{BodyStore, Program};
pub use symbols::{FieldRef, MethodRef, SymbolTable, TypeRef};
pub use types::{Reg, ValueKind};
