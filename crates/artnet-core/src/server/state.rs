/// Lifecycle of an [`ArtNetServer`](super::ArtNetServer).
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "Stopped"),
            ServerState::Starting => write!(f, "Starting"),
            ServerState::Running => write!(f, "Running"),
            ServerState::Stopping => write!(f, "Stopping"),
        }
    }
}
