//! Host environment detection

use crate::config::EnvironmentMode;
use std::io::IsTerminal;

/// Capabilities of the process host, fixed once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEnvironment {
    /// A user can complete browser authorization and answer prompts
    Interactive,
    /// No user is present; acquirers fall back to placeholder credentials
    Headless,
}

impl HostEnvironment {
    /// Resolve the configured mode into a concrete environment
    pub fn detect(mode: EnvironmentMode) -> Self {
        Self::resolve(mode, std::io::stdin().is_terminal())
    }

    /// Resolve `mode` given whether stdin is attached to a terminal
    pub const fn resolve(mode: EnvironmentMode, stdin_is_terminal: bool) -> Self {
        match mode {
            EnvironmentMode::Interactive => Self::Interactive,
            EnvironmentMode::Headless => Self::Headless,
            EnvironmentMode::Auto if stdin_is_terminal => Self::Interactive,
            EnvironmentMode::Auto => Self::Headless,
        }
    }

    /// Whether prompts and the authorization launcher are available
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Interactive)
    }
}

impl std::fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Headless => write!(f, "headless"),
        }
    }
}
