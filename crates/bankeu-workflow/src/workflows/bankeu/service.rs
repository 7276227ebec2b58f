use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::aggregate::{BatchAction, PreconditionFailed, SubmissionAggregator, VillageSubmissionSummary};
use super::documents::{ArtifactGenerationError, DocumentError, DocumentGateEngine, GateNotSatisfiedError};
use super::domain::{
    Activity, DistrictId, DocumentArtifact, DocumentKind, Proposal, ProposalId, ReviewStatus,
    TeamCompletionStatus, VillageId, VillageLetterBundle,
};
use super::gateway::WorkflowGateway;
use super::review::{
    AgencyDecision, InvalidStateError, LetterDecision, ReviewError, ReviewStateMachine,
    ValidationError,
};
use super::snapshot::{ComparisonView, ReferenceSnapshotManager};
use super::store::{DocumentRenderer, FileStore, ProposalStore, StoreError};
use super::team::TeamCompletionTracker;

/// Error raised by the workflow service. Every variant wraps one member of
/// the workflow error taxonomy; nothing is swallowed internally.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
    #[error(transparent)]
    Gate(#[from] GateNotSatisfiedError),
    #[error(transparent)]
    Precondition(#[from] PreconditionFailed),
    #[error(transparent)]
    ArtifactGeneration(#[from] ArtifactGenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReviewError> for WorkflowError {
    fn from(value: ReviewError) -> Self {
        match value {
            ReviewError::Validation(err) => Self::Validation(err),
            ReviewError::InvalidState(err) => Self::InvalidState(err),
        }
    }
}

impl From<DocumentError> for WorkflowError {
    fn from(value: DocumentError) -> Self {
        match value {
            DocumentError::Validation(err) => Self::Validation(err),
            DocumentError::Gate(err) => Self::Gate(err),
            DocumentError::Generation(err) => Self::ArtifactGeneration(err),
            DocumentError::Store(err) => Self::Store(err),
        }
    }
}

/// Intake payload for a new village proposal.
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub village_id: VillageId,
    pub district_id: DistrictId,
    pub title: String,
    pub requested_budget: u64,
    pub funding_year: u16,
    pub activities: Vec<Activity>,
    pub file: Option<Vec<u8>>,
}

/// Result of a batch decision, including how many proposals were forwarded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BatchOutcome {
    pub action: BatchAction,
    pub forwarded: usize,
    pub decided_at: DateTime<Utc>,
}

static PROPOSAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_proposal_id() -> ProposalId {
    let id = PROPOSAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ProposalId(format!("prop-{id:06}"))
}

/// Facade composing the state machine, gating engines, aggregator, and
/// snapshot manager over the store and renderer collaborators.
pub struct ProposalWorkflowService<S, F, D> {
    store: Arc<S>,
    files: Arc<F>,
    documents: DocumentGateEngine<S, F, D>,
    snapshots: ReferenceSnapshotManager<S, F>,
}

impl<S, F, D> ProposalWorkflowService<S, F, D>
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    pub fn new(store: Arc<S>, files: Arc<F>, renderer: Arc<D>) -> Self {
        let documents = DocumentGateEngine::new(store.clone(), files.clone(), renderer);
        let snapshots = ReferenceSnapshotManager::new(store.clone(), files.clone());
        Self {
            store,
            files,
            documents,
            snapshots,
        }
    }

    /// Register a village upload as a new pending proposal.
    pub fn create_proposal(&self, intake: NewProposal) -> Result<Proposal, WorkflowError> {
        let file_path = match intake.file {
            Some(bytes) => Some(self.files.store(&bytes)?),
            None => None,
        };
        let proposal = Proposal {
            id: next_proposal_id(),
            village_id: intake.village_id,
            district_id: intake.district_id,
            title: intake.title,
            requested_budget: intake.requested_budget,
            funding_year: intake.funding_year,
            activities: intake.activities,
            file_path,
            district_status: ReviewStatus::Pending,
            agency_status: None,
            district_note: None,
            agency_note: None,
            submitted_to_department: false,
            submitted_to_department_at: None,
            revision_requested_at: None,
            reviewed_at: None,
            legacy_status: None,
            version: 0,
        };
        Ok(self.store.insert(proposal)?)
    }

    fn fetch_required(&self, id: &ProposalId) -> Result<Proposal, WorkflowError> {
        Ok(self.store.fetch(id)?.ok_or(StoreError::NotFound)?)
    }

    /// District verifies a pending proposal.
    pub fn approve_district(&self, id: &ProposalId) -> Result<Proposal, WorkflowError> {
        let mut proposal = self.fetch_required(id)?;
        ReviewStateMachine::approve(&mut proposal)?;
        let stored = self.store.update(proposal)?;
        info!(proposal_id = %stored.id, "district verified proposal");
        Ok(stored)
    }

    /// District returns a pending proposal to the village with a note.
    pub fn request_revision(
        &self,
        id: &ProposalId,
        note: &str,
    ) -> Result<Proposal, WorkflowError> {
        let mut proposal = self.fetch_required(id)?;
        ReviewStateMachine::request_revision(&mut proposal, note, Utc::now())?;
        let stored = self.store.update(proposal)?;
        info!(proposal_id = %stored.id, "district requested revision");
        Ok(stored)
    }

    /// Village replaces the file after a revision request.
    pub fn resubmit(&self, id: &ProposalId, file: &[u8]) -> Result<Proposal, WorkflowError> {
        let mut proposal = self.fetch_required(id)?;
        // Validate the state before paying for the file write.
        if proposal.district_status != ReviewStatus::Revision {
            return Err(InvalidStateError {
                proposal_id: proposal.id.clone(),
                expected: ReviewStatus::Revision,
                found: proposal.district_status,
            }
            .into());
        }
        let file_path = self.files.store(file)?;
        ReviewStateMachine::resubmit(&mut proposal, file_path, Utc::now())?;
        Ok(self.store.update(proposal)?)
    }

    /// Record an agency decision and freeze the reference snapshot if this
    /// is the first one.
    pub fn record_agency_decision(
        &self,
        id: &ProposalId,
        decision: AgencyDecision,
        note: Option<&str>,
    ) -> Result<Proposal, WorkflowError> {
        let mut proposal = self.fetch_required(id)?;
        ReviewStateMachine::record_agency_decision(&mut proposal, decision, note)?;
        let decided_at = Utc::now();
        self.snapshots
            .capture_on_agency_decision(&proposal, decision.status(), decided_at)?;
        Ok(self.store.update(proposal)?)
    }

    pub fn team_status(&self, id: &ProposalId) -> Result<TeamCompletionStatus, WorkflowError> {
        self.fetch_required(id)?;
        let members = self.store.team_members(id)?;
        Ok(TeamCompletionTracker::evaluate(&members))
    }

    pub fn generate_berita_acara(
        &self,
        id: &ProposalId,
        author_id: &str,
    ) -> Result<DocumentArtifact, WorkflowError> {
        let proposal = self.fetch_required(id)?;
        let artifact = self
            .documents
            .generate_berita_acara(&proposal, author_id, Utc::now())?;
        Ok(artifact)
    }

    pub fn generate_surat_pengantar(
        &self,
        id: &ProposalId,
        nomor_surat: &str,
    ) -> Result<DocumentArtifact, WorkflowError> {
        let proposal = self.fetch_required(id)?;
        let artifact = self
            .documents
            .generate_surat_pengantar(&proposal, nomor_surat, Utc::now())?;
        Ok(artifact)
    }

    /// District reviews one of the two village letters for the year.
    pub fn review_letter(
        &self,
        village: &VillageId,
        funding_year: u16,
        kind: super::domain::LetterKind,
        decision: LetterDecision,
        note: Option<&str>,
    ) -> Result<VillageLetterBundle, WorkflowError> {
        let mut bundle = self
            .store
            .village_letters(village, funding_year)?
            .ok_or(StoreError::NotFound)?;
        ReviewStateMachine::review_letter(&mut bundle, kind, decision, note)?;
        self.store.upsert_village_letters(bundle.clone())?;
        Ok(bundle)
    }

    /// Aggregate one village's batch for the year.
    pub fn village_summary(
        &self,
        village: &VillageId,
        funding_year: u16,
    ) -> Result<VillageSubmissionSummary, WorkflowError> {
        let proposals = self.store.list_by_village(village, funding_year)?;
        self.summarize_proposals(village, funding_year, &proposals)
    }

    fn summarize_proposals(
        &self,
        village: &VillageId,
        funding_year: u16,
        proposals: &[Proposal],
    ) -> Result<VillageSubmissionSummary, WorkflowError> {
        let mut documents = Vec::new();
        for proposal in proposals {
            for kind in [DocumentKind::BeritaAcara, DocumentKind::SuratPengantar] {
                if let Some(artifact) = self.store.find_document(&proposal.id, kind)? {
                    documents.push(artifact);
                }
            }
        }
        let letters = self.store.village_letters(village, funding_year)?;
        Ok(SubmissionAggregator::summarize(
            village.clone(),
            funding_year,
            proposals,
            &documents,
            letters.as_ref(),
        ))
    }

    /// Decide the batch action under the given gateway value without
    /// performing the forward.
    pub fn decide_batch(
        &self,
        village: &VillageId,
        funding_year: u16,
        gateway: WorkflowGateway,
    ) -> Result<BatchAction, WorkflowError> {
        let summary = self.village_summary(village, funding_year)?;
        Ok(SubmissionAggregator::decide(&summary, gateway)?)
    }

    /// Decide and, when the decision is forward, submit the whole batch in
    /// one store transaction. The decision and the write share one read of
    /// the village: the versions decided on are handed to `submit_batch`,
    /// so a proposal that changes in between fails the whole batch instead
    /// of forwarding stale state. No partial forwarding: the store commits
    /// all proposals or none.
    pub fn forward_batch(
        &self,
        village: &VillageId,
        funding_year: u16,
        gateway: WorkflowGateway,
    ) -> Result<BatchOutcome, WorkflowError> {
        let proposals = self.store.list_by_village(village, funding_year)?;
        let summary = self.summarize_proposals(village, funding_year, &proposals)?;
        let action = SubmissionAggregator::decide(&summary, gateway)?;
        let decided_at = Utc::now();

        let forwarded = match action {
            BatchAction::ReturnToVillage => 0,
            BatchAction::ForwardToDepartment => {
                let batch: Vec<(ProposalId, u64)> = proposals
                    .iter()
                    .filter(|p| p.is_uploaded())
                    .map(|p| (p.id.clone(), p.version))
                    .collect();
                self.store.submit_batch(&batch, decided_at)?;
                info!(village = %village.0, count = batch.len(), "batch forwarded to department");
                batch.len()
            }
        };

        Ok(BatchOutcome {
            action,
            forwarded,
            decided_at,
        })
    }

    /// The frozen-baseline comparison, available only after a district
    /// revision followed by a village re-upload.
    pub fn comparison(&self, id: &ProposalId) -> Result<Option<ComparisonView>, WorkflowError> {
        let proposal = self.fetch_required(id)?;
        Ok(self.snapshots.comparison_view(&proposal)?)
    }
}
