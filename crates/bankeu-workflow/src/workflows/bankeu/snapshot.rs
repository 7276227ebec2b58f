use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Proposal, ReferenceSnapshot, ReviewStatus};
use super::store::{FileStore, ProposalStore, StoreError};

/// The two files a reviewer inspects side by side after a resubmission.
/// There is no automatic merge; a human decides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    pub reference_path: String,
    pub current_path: String,
    pub decided_at: DateTime<Utc>,
}

/// Freezes an agency-reviewed file at the moment of the decision so it can
/// be diffed against a later resubmission. The first agency decision's file
/// is the baseline; the existence guard is explicit, not an accident of
/// call ordering.
pub struct ReferenceSnapshotManager<S, F> {
    store: Arc<S>,
    files: Arc<F>,
}

impl<S, F> ReferenceSnapshotManager<S, F>
where
    S: ProposalStore,
    F: FileStore,
{
    pub fn new(store: Arc<S>, files: Arc<F>) -> Self {
        Self { store, files }
    }

    /// Capture a snapshot for an agency decision event. Returns `None` when
    /// the proposal has no file or a snapshot already exists.
    pub fn capture_on_agency_decision(
        &self,
        proposal: &Proposal,
        decision: ReviewStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<ReferenceSnapshot>, StoreError> {
        let Some(file_path) = proposal.file_path.as_deref() else {
            return Ok(None);
        };
        if self.store.find_snapshot(&proposal.id)?.is_some() {
            return Ok(None);
        }

        let snapshot_path = self.files.copy_as_snapshot(file_path)?;
        let snapshot = ReferenceSnapshot {
            proposal_id: proposal.id.clone(),
            snapshot_path: snapshot_path.clone(),
            decision,
            decided_at,
        };

        match self.store.insert_snapshot(snapshot) {
            Ok(stored) => {
                info!(proposal_id = %stored.proposal_id, "reference snapshot captured");
                Ok(Some(stored))
            }
            // Lost the race to an earlier decision; that one is the baseline,
            // and the copy made here has no record pointing at it.
            Err(StoreError::Conflict) => {
                if let Err(err) = self.files.remove(&snapshot_path) {
                    warn!(path = %snapshot_path, error = %err, "failed to clean up unrecorded snapshot copy");
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// True iff a prior district revision is on record, the village has
    /// re-uploaded since, and a frozen baseline exists to compare against.
    pub fn should_show_comparison(&self, proposal: &Proposal) -> Result<bool, StoreError> {
        if proposal.revision_requested_at.is_none() || proposal.reviewed_at.is_none() {
            return Ok(false);
        }
        Ok(self.store.find_snapshot(&proposal.id)?.is_some())
    }

    pub fn comparison_view(&self, proposal: &Proposal) -> Result<Option<ComparisonView>, StoreError> {
        if proposal.revision_requested_at.is_none() || proposal.reviewed_at.is_none() {
            return Ok(None);
        }
        let Some(current_path) = proposal.file_path.clone() else {
            return Ok(None);
        };
        let Some(snapshot) = self.store.find_snapshot(&proposal.id)? else {
            return Ok(None);
        };
        Ok(Some(ComparisonView {
            reference_path: snapshot.snapshot_path,
            current_path,
            decided_at: snapshot.decided_at,
        }))
    }
}
