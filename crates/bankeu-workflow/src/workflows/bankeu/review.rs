use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    LetterKind, LetterReviewStatus, Proposal, ProposalId, ReviewStatus, VillageLetterBundle,
};

/// Caller-correctable input errors; never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("revision request requires a non-empty note")]
    EmptyRevisionNote,
    #[error("letter rejection requires a non-empty note")]
    EmptyRejectionNote,
    #[error("surat pengantar requires a non-empty nomor surat")]
    EmptyNomorSurat,
    #[error("resubmission requires a replacement file")]
    EmptyFile,
}

/// A transition was attempted from the wrong state; the caller's view is
/// stale and should be re-fetched, not blindly resubmitted.
#[derive(Debug, thiserror::Error)]
#[error("proposal {proposal_id} is {found}, expected {expected}")]
pub struct InvalidStateError {
    pub proposal_id: ProposalId,
    pub expected: ReviewStatus,
    pub found: ReviewStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
}

/// Decision rendered by the agency review track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyDecision {
    Approved,
    RevisionRequested,
}

impl AgencyDecision {
    pub const fn status(self) -> ReviewStatus {
        match self {
            Self::Approved => ReviewStatus::Verified,
            Self::RevisionRequested => ReviewStatus::Revision,
        }
    }
}

/// District decision on one village letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterDecision {
    Approved,
    Rejected,
}

/// Owns per-proposal status transitions at each authority level. All
/// operations are pure mutations over fetched records; persistence and its
/// single-writer discipline live behind the store.
pub struct ReviewStateMachine;

impl ReviewStateMachine {
    fn require_pending(proposal: &Proposal) -> Result<(), InvalidStateError> {
        if proposal.district_status != ReviewStatus::Pending {
            return Err(InvalidStateError {
                proposal_id: proposal.id.clone(),
                expected: ReviewStatus::Pending,
                found: proposal.district_status,
            });
        }
        Ok(())
    }

    /// District verifies a pending proposal. Clears any earlier reject note;
    /// artifacts are generated later, explicitly.
    pub fn approve(proposal: &mut Proposal) -> Result<(), ReviewError> {
        Self::require_pending(proposal)?;
        proposal.district_status = ReviewStatus::Verified;
        proposal.district_note = None;
        Ok(())
    }

    /// District returns a pending proposal to the village. The note is the
    /// one mandatory human-authored justification in the pipeline.
    pub fn request_revision(
        proposal: &mut Proposal,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        if note.trim().is_empty() {
            return Err(ValidationError::EmptyRevisionNote.into());
        }
        Self::require_pending(proposal)?;
        proposal.district_status = ReviewStatus::Revision;
        proposal.district_note = Some(note.trim().to_string());
        proposal.revision_requested_at = Some(at);
        Ok(())
    }

    /// Village replaces the file after a revision request; the proposal
    /// re-enters `pending` at the same level with `reviewed_at` refreshed.
    pub fn resubmit(
        proposal: &mut Proposal,
        file_path: String,
        at: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        if file_path.trim().is_empty() {
            return Err(ValidationError::EmptyFile.into());
        }
        if proposal.district_status != ReviewStatus::Revision {
            return Err(InvalidStateError {
                proposal_id: proposal.id.clone(),
                expected: ReviewStatus::Revision,
                found: proposal.district_status,
            }
            .into());
        }
        proposal.file_path = Some(file_path);
        proposal.district_status = ReviewStatus::Pending;
        proposal.reviewed_at = Some(at);
        Ok(())
    }

    /// Record an agency-track decision. The agency may re-decide after a
    /// resubmission; snapshot capture stays first-decision-wins regardless.
    pub fn record_agency_decision(
        proposal: &mut Proposal,
        decision: AgencyDecision,
        note: Option<&str>,
    ) -> Result<(), ReviewError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if decision == AgencyDecision::RevisionRequested && note.is_none() {
            return Err(ValidationError::EmptyRevisionNote.into());
        }
        proposal.agency_status = Some(decision.status());
        proposal.agency_note = note.map(str::to_string);
        Ok(())
    }

    /// District reviews one of the two village letters. Rejection requires a
    /// non-empty note.
    pub fn review_letter(
        bundle: &mut VillageLetterBundle,
        kind: LetterKind,
        decision: LetterDecision,
        note: Option<&str>,
    ) -> Result<(), ReviewError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let letter = bundle.letter_mut(kind);
        match decision {
            LetterDecision::Approved => {
                letter.review_status = LetterReviewStatus::Approved;
                letter.rejection_note = None;
            }
            LetterDecision::Rejected => {
                let note = note.ok_or(ValidationError::EmptyRejectionNote)?;
                letter.review_status = LetterReviewStatus::Rejected;
                letter.rejection_note = Some(note.to_string());
            }
        }
        Ok(())
    }
}
