#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    Fast,
    Standard,
    Full,
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub level: VerificationLevel,
    pub max_diagnostics: usize,
    /// Largest register frame a method may declare.
    pub max_registers: u16,
    pub allow_unreachable_blocks: bool,
    pub check_signatures: bool,
}

impl VerifierConfig {
    pub fn for_level(level: VerificationLevel) -> Self {
        match level {
            VerificationLevel::Fast => Self {
                level,
                max_diagnostics: 200,
                max_registers: 16,
                allow_unreachable_blocks: true,
                check_signatures: false,
            },
            VerificationLevel::Standard => Self {
                level,
                max_diagnostics: 200,
                max_registers: 16,
                allow_unreachable_blocks: true,
                check_signatures: true,
            },
            VerificationLevel::Full => Self {
                level,
                max_diagnostics: 500,
                max_registers: 16,
                allow_unreachable_blocks: false,
                check_signatures: true,
            },
        }
    }

    pub fn should_check_signatures(&self) -> bool {
        self.check_signatures || matches!(self.level, VerificationLevel::Full)
    }

    pub fn should_report_unreachable(&self) -> bool {
        !self.allow_unreachable_blocks
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::for_level(VerificationLevel::Standard)
    }
}
