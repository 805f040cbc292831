mod config;
mod diagnostic;
mod report;
mod verify;

pub use config::{VerificationLevel, VerifierConfig};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Note, Severity};
pub use report::VerificationReport;
pub use verify::{verify_method, verify_method_or_panic, verify_program};

#[macro_export]
macro_rules! debug_verify_method {
    ($symbols:expr, $method:expr) => {{
        if cfg!(debug_assertions) {
            let cfg = $crate::VerifierConfig::for_level($crate::VerificationLevel::Full);
            $crate::verify_method_or_panic($symbols, $method, &cfg);
        }
    }};
}
