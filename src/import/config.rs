//! Per-plan construction options.

use serde::{Deserialize, Serialize};

/// What to do with remote GIDs that no process of the source map owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnownedRemoteHandling {
    /// Drop them without a diagnostic.
    Ignore,
    /// Drop them and log a warning.
    #[default]
    Warn,
    /// Fail construction on every rank.
    Error,
}

/// How a union plan learns its export side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportStrategy {
    /// Send the union's remote lists to their owners (peer discovery).
    #[default]
    FromRecvs,
    /// Merge the inputs' export lists and only exchange message sizes.
    FromSends,
}

/// Options for building an [`Import`](super::Import).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Trace each construction stage with `log::debug!`.
    pub debug: bool,
    pub unowned_remotes: UnownedRemoteHandling,
    pub export_strategy: ExportStrategy,
}

impl ImportConfig {
    /// Debug tracing on, everything else default.
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    /// Reject unowned remote GIDs instead of dropping them.
    pub fn strict() -> Self {
        Self {
            unowned_remotes: UnownedRemoteHandling::Error,
            ..Self::default()
        }
    }

    pub fn with_export_strategy(mut self, strategy: ExportStrategy) -> Self {
        self.export_strategy = strategy;
        self
    }
}
