use guide_proto::model::DayKey;
use thiserror::Error;

/// Conditions the guide surfaces to its caller. None of them are fatal:
/// the worst outcome is an empty-state panel or a transient toast.
///
/// Duplicate `(channel, start)` programs with differing fields are not an
/// error; the cache keeps the first one seen and reports the count in its
/// `MergeReport`.
#[derive(Debug, Error)]
pub enum GuideError {
    /// No channels (or nothing left after filtering) to show.
    #[error("no guide data available")]
    DataUnavailable,

    /// A day listing could not be fetched. The day stays unloaded so the
    /// next proximity trigger retries it.
    #[error("failed to load guide for {day}: {reason}")]
    FetchFailure { day: DayKey, reason: String },

    /// Something the renderer expected to anchor on is not there.
    #[error("render target missing: {0}")]
    RenderTargetMissing(String),
}

impl GuideError {
    /// Whether the UI should show this as a transient notice rather than
    /// an empty state.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailure { .. })
    }
}
