use std::fmt;
use tracing::debug;

/// Lifecycle of a single compile request
///
/// `Queued -> AcquiringResources -> CacheCheck -> Hit -> Done`, or
/// `... -> Building -> Optimizing -> Done`; failures go through
/// `Reporting` before `Done`. There is no retry edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Queued,
    AcquiringResources,
    CacheCheck,
    Hit,
    Building,
    Optimizing,
    Reporting,
    Done,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::AcquiringResources => "acquiring-resources",
            Self::CacheCheck => "cache-check",
            Self::Hit => "hit",
            Self::Building => "building",
            Self::Optimizing => "optimizing",
            Self::Reporting => "reporting",
            Self::Done => "done",
        }
    }

    pub fn enter(self, subject: &str) {
        debug!(phase = self.as_str(), subject, "Build phase");
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
