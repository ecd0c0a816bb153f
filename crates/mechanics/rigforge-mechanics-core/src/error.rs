use rigforge_api_core::SceneError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MechanicsError {
    /// The joint chain cannot answer a direction query (near-zero span or
    /// segment). Fails closed rather than guessing an axis.
    #[error("degenerate chain: {reason}")]
    DegenerateChain { reason: String },

    /// Pole vector is collinear with the aim axis; the bend plane is
    /// undefined.
    #[error("degenerate pole vector")]
    DegeneratePole,

    #[error("chain too short: need at least {need} joints, got {got}")]
    ChainTooShort { need: usize, got: usize },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl MechanicsError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        MechanicsError::DegenerateChain {
            reason: reason.into(),
        }
    }
}
