//! Component lifecycle states.

/// Lifecycle state of a process component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Built, but its predecessors have not completed yet.
    Unready,
    /// May be started.
    Ready,
    /// Work has been scheduled and not yet resolved.
    Executing,
    /// Work completed. Terminal unless a later sibling fails.
    Succeeded,
    /// Work failed; compensation has not run yet.
    Failed,
    /// Compensation is running.
    RollingBack,
    /// Compensation completed.
    Rollbacked,
    /// Compensation itself failed.
    FailedTerminal,
}

impl ProcessState {
    /// Whether `start()`/`execute()` is allowed from this state.
    pub const fn is_startable(self) -> bool {
        matches!(self, Self::Unready | Self::Ready)
    }

    /// Whether `rollback()` is allowed from this state.
    pub const fn can_roll_back(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the component will not change state on its own anymore.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Rollbacked | Self::FailedTerminal)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unready => "Unready",
            Self::Ready => "Ready",
            Self::Executing => "Executing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::RollingBack => "RollingBack",
            Self::Rollbacked => "Rollbacked",
            Self::FailedTerminal => "FailedTerminal",
        };
        f.write_str(name)
    }
}
