use std::fmt;

/// Parts of the application with their own lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// Camera hub: detectors, registry follower, viewer streams
    Hub,
    /// HTTP adapter
    StreamServer,
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Component::Hub => "hub",
            Component::StreamServer => "stream_server",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed { reason: String },
}

impl ComponentState {
    pub fn failed<S: Into<String>>(reason: S) -> Self {
        ComponentState::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ComponentState::Failed { .. })
    }
}

/// Why the application is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// SIGTERM or SIGINT
    Signal(&'static str),
    /// The shutdown token was cancelled from inside the process
    UserRequest,
    /// The HTTP adapter stopped on its own
    ServerExited(String),
}
