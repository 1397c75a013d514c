/// Why a run stopped before completing normally.
///
/// All of these are soft aborts: the machine returns the captures
/// accumulated so far with `aborted = true` rather than failing the call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MatchError {
    /// The pattern executed `halt`.
    Halted,
    /// The capture tree exceeded the allocation ceiling.
    AllocLimit { limit: usize, used: usize },
    /// Grammar call nesting exceeded the depth ceiling.
    DepthLimit { limit: usize },
    /// The caller's cancellation flag was raised.
    Cancelled,
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::Halted => write!(f, "match halted by pattern"),
            MatchError::AllocLimit { limit, used } => {
                write!(f, "allocation limit exceeded: {} of {} bytes", used, limit)
            }
            MatchError::DepthLimit { limit } => {
                write!(f, "grammar call depth exceeded {}", limit)
            }
            MatchError::Cancelled => write!(f, "match cancelled"),
        }
    }
}

impl std::error::Error for MatchError {}
