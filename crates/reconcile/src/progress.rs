//! Progress reporting for synchronization runs

use crate::error::Error;
use crate::types::{EntityKind, PassReport, SyncReport};

/// Progress callback for synchronization runs
///
/// Implement this trait to receive progress updates during a run.
pub trait SyncProgress: Send {
    /// Called before a pass reads the directory
    fn on_pass_start(&mut self, kind: EntityKind);

    /// Called when a pass has written all its changes
    fn on_pass_complete(&mut self, pass: &PassReport);

    /// Called when a pass fails and the run stops
    fn on_abort(&mut self, _kind: EntityKind, _error: &Error) {}

    /// Called after the last pass
    fn on_complete(&mut self, _report: &SyncReport) {}
}

/// No-op progress callback
pub struct NoProgress;

impl SyncProgress for NoProgress {
    fn on_pass_start(&mut self, _kind: EntityKind) {}
    fn on_pass_complete(&mut self, _pass: &PassReport) {}
}
