use std::fmt;

use dexopt_ir::{BlockId, InstId, MethodRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    InvalidMethodRef,
    MissingEntryBlock,
    EmptyBlock,
    MissingTerminator,
    TerminatorNotLast,
    BranchToMissingBlock,
    UnreachableBlock,
    RegisterOutOfFrame,
    FrameExceedsLimit,
    InvalidInsSize,
    InvokeArityMismatch,
}

impl DiagnosticCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::InvalidMethodRef => 3,
            Self::MissingEntryBlock => 105,
            Self::EmptyBlock => 200,
            Self::MissingTerminator => 201,
            Self::TerminatorNotLast => 202,
            Self::BranchToMissingBlock => 300,
            Self::UnreachableBlock => 304,
            Self::RegisterOutOfFrame => 500,
            Self::FrameExceedsLimit => 501,
            Self::InvalidInsSize => 502,
            Self::InvokeArityMismatch => 603,
        }
    }

    pub fn as_str(self) -> String {
        format!("IR{:04}", self.as_u16())
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => "error".fmt(f),
            Self::Warning => "warning".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Program,
    Method(MethodRef),
    Block {
        method: MethodRef,
        block: BlockId,
    },
    Inst {
        method: MethodRef,
        block: BlockId,
        inst: InstId,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program => "program".fmt(f),
            Self::Method(method) => write!(f, "method{}", method.as_u32()),
            Self::Block { method, block } => write!(f, "method{}:{block}", method.as_u32()),
            Self::Inst {
                method,
                block,
                inst,
            } => write!(f, "method{}:{block}:{inst}", method.as_u32()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub primary: Location,
    pub notes: Vec<Note>,
    /// Text of the offending instruction, when there is one.
    pub snippet: Option<String>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
        primary: Location,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            primary,
            notes: Vec::new(),
            snippet: None,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Error, message, primary)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Warning, message, primary)
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            message: message.into(),
        });
        self
    }

    pub fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} [{}] {} @ {}",
            self.severity, self.code, self.message, self.primary
        )?;

        for note in &self.notes {
            writeln!(f, "  note: {}", note.message)?;
        }

        if let Some(snippet) = &self.snippet {
            writeln!(f, "  | {snippet}")?;
        }

        Ok(())
    }
}
