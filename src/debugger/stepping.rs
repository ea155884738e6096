/// Where the call-depth filter currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebuggerState {
    /// Script frames are being reported.
    #[default]
    Running,
    /// Inside this many nested calls that are not reported.
    Suppressing(usize),
    /// The run ended. Nothing further is reported.
    Finished,
}

impl DebuggerState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }

    pub fn suppressed_depth(self) -> usize {
        match self {
            Self::Suppressing(depth) => depth,
            _ => 0,
        }
    }

    /// One call deeper into unreported territory.
    pub fn descend(self) -> Self {
        match self {
            Self::Running => Self::Suppressing(1),
            Self::Suppressing(depth) => Self::Suppressing(depth + 1),
            Self::Finished => Self::Finished,
        }
    }

    /// One unreported call returned.
    pub fn ascend(self) -> Self {
        match self {
            Self::Suppressing(1) => Self::Running,
            Self::Suppressing(depth) => Self::Suppressing(depth - 1),
            other => other,
        }
    }
}
