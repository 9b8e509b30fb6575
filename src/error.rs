use thiserror::Error;

use crate::oracle::OracleError;
use crate::types::Address;

/// Precondition failures of the guarded oracle module.
///
/// Every variant is caller-correctable and leaves the module untouched.
/// [`ProxyError::code`] is the stable reason code surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("not a guardian: {0}")]
    NotAuthorized(Address),

    #[error("guardian already exists: {0}")]
    AlreadyExists(Address),

    #[error("guardian does not exist: {0}")]
    NotFound(Address),

    #[error("cannot remove last guardian")]
    LastGuardian,

    #[error("already paused")]
    AlreadyHalted,

    #[error("already unpaused")]
    AlreadyActive,

    #[error("oracle is paused")]
    Halted,

    #[error("call data matches no operation")]
    UnsupportedCall,

    #[error("oracle endpoint unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),
}

impl ProxyError {
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::NotAuthorized(_) => "NotAuthorized",
            ProxyError::AlreadyExists(_) => "AlreadyExists",
            ProxyError::NotFound(_) => "NotFound",
            ProxyError::LastGuardian => "LastGuardian",
            ProxyError::AlreadyHalted => "AlreadyHalted",
            ProxyError::AlreadyActive => "AlreadyActive",
            ProxyError::Halted => "Halted",
            ProxyError::UnsupportedCall => "UnsupportedCall",
            ProxyError::OracleUnavailable(_) => "OracleUnavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let addr = Address::new([1u8; 20]);
        let all = [
            ProxyError::NotAuthorized(addr),
            ProxyError::AlreadyExists(addr),
            ProxyError::NotFound(addr),
            ProxyError::LastGuardian,
            ProxyError::AlreadyHalted,
            ProxyError::AlreadyActive,
            ProxyError::Halted,
            ProxyError::UnsupportedCall,
            ProxyError::OracleUnavailable(OracleError::Transport("timeout".into())),
        ];
        let mut codes: Vec<_> = all.iter().map(ProxyError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
