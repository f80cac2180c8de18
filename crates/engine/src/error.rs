/// Outcomes of a trigger call that reject the operation.
///
/// The first two are deliberately distinct so a caller can tell a typo
/// (`UnknownTrigger`) from an invalid-state call (`WrongState`). Guard
/// failures are expected, user-facing outcomes, never logged as errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No transition anywhere in the contract uses this trigger.
    #[error("Unknown trigger: {trigger}")]
    UnknownTrigger { trigger: String },

    /// The trigger exists, but not from the record's current status.
    #[error("Cannot {trigger}: currently {status}")]
    WrongState { trigger: String, status: String },

    /// The first failing guard, with a human-readable reason.
    #[error("guard '{guard}' failed: {reason}")]
    GuardFailed { guard: String, reason: String },

    /// A transition names a guard the contract does not define.
    #[error("guard '{guard}' is not defined in the contract")]
    UndefinedGuard { guard: String },

    /// A declared-but-unimplemented effect type reached execution.
    /// Rejected explicitly rather than silently accepted.
    #[error("effect type '{kind}' is declared but not executable")]
    UnsupportedEffect { kind: String },
}
