use std::fmt;

/// Outcome of running a push message through the state tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushClassification {
    /// Same state as the tracked baseline; the confirmatory refresh is skipped.
    Unchanged,
    /// New information; downstream should refresh.
    Actionable,
}

impl PushClassification {
    pub fn is_actionable(self) -> bool {
        matches!(self, PushClassification::Actionable)
    }
}

impl fmt::Display for PushClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushClassification::Unchanged => f.write_str("unchanged"),
            PushClassification::Actionable => f.write_str("actionable"),
        }
    }
}
