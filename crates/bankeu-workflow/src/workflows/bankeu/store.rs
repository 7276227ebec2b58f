use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    DistrictId, DocumentArtifact, DocumentKind, Proposal, ProposalId, ReferenceSnapshot,
    ReviewStatus, VerificationTeamMember, VillageId, VillageLetterBundle,
};

/// Persistence abstraction for proposals and their workflow side tables.
///
/// Implementations must give `update` optimistic-concurrency semantics (the
/// stored `version` must match the incoming record's) and make
/// `submit_batch` atomic: either every proposal in the batch gains
/// `submitted_to_department` or none does.
pub trait ProposalStore: Send + Sync {
    fn insert(&self, proposal: Proposal) -> Result<Proposal, StoreError>;
    fn fetch(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError>;
    fn update(&self, proposal: Proposal) -> Result<Proposal, StoreError>;
    fn list_by_village(
        &self,
        village: &VillageId,
        funding_year: u16,
    ) -> Result<Vec<Proposal>, StoreError>;
    fn list_by_district(
        &self,
        district: &DistrictId,
        funding_year: u16,
    ) -> Result<Vec<Proposal>, StoreError>;

    fn team_members(&self, id: &ProposalId) -> Result<Vec<VerificationTeamMember>, StoreError>;
    fn insert_team_member(&self, member: VerificationTeamMember) -> Result<(), StoreError>;
    fn update_team_member(&self, member: VerificationTeamMember) -> Result<(), StoreError>;

    fn find_document(
        &self,
        id: &ProposalId,
        kind: DocumentKind,
    ) -> Result<Option<DocumentArtifact>, StoreError>;
    /// Fails with `Conflict` when an artifact of the same kind already
    /// exists; this is the check-then-act backstop for generation races.
    fn insert_document(&self, artifact: DocumentArtifact)
        -> Result<DocumentArtifact, StoreError>;

    fn village_letters(
        &self,
        village: &VillageId,
        funding_year: u16,
    ) -> Result<Option<VillageLetterBundle>, StoreError>;
    fn upsert_village_letters(&self, bundle: VillageLetterBundle) -> Result<(), StoreError>;

    fn find_snapshot(&self, id: &ProposalId) -> Result<Option<ReferenceSnapshot>, StoreError>;
    /// Fails with `Conflict` when a snapshot already exists for the
    /// proposal; the first agency decision's file is the frozen baseline.
    fn insert_snapshot(
        &self,
        snapshot: ReferenceSnapshot,
    ) -> Result<ReferenceSnapshot, StoreError>;

    /// Mark every listed proposal as submitted to the department, all in one
    /// transaction. Each entry carries the version the caller decided on;
    /// any mismatch fails the whole batch with `VersionConflict`, so a
    /// proposal that changed between the decision and the write is never
    /// forwarded.
    fn submit_batch(
        &self,
        batch: &[(ProposalId, u64)],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Opaque file storage consumed through references only.
pub trait FileStore: Send + Sync {
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    /// Copy an existing file into snapshot storage, returning the new path.
    fn copy_as_snapshot(&self, path: &str) -> Result<String, StoreError>;
    /// Discard a file whose record never made it into the store.
    fn remove(&self, path: &str) -> Result<(), StoreError>;
}

/// Black-box template-fill service for the two district artifacts.
pub trait DocumentRenderer: Send + Sync {
    fn render_berita_acara(
        &self,
        proposal: &Proposal,
        team: &[VerificationTeamMember],
    ) -> Result<Vec<u8>, RenderError>;
    fn render_surat_pengantar(
        &self,
        proposal: &Proposal,
        nomor_surat: &str,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale record version")]
    VersionConflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Renderer failure; transient from the workflow's point of view.
#[derive(Debug, thiserror::Error)]
#[error("document renderer failed: {0}")]
pub struct RenderError(pub String);

/// Sanitized representation of a proposal's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalStatusView {
    pub proposal_id: ProposalId,
    pub district_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency_status: Option<&'static str>,
    pub uploaded: bool,
    pub submitted_to_department: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_note: Option<String>,
}

impl ProposalStatusView {
    pub fn from_proposal(proposal: &Proposal) -> Self {
        Self {
            proposal_id: proposal.id.clone(),
            district_status: proposal.district_status.label(),
            agency_status: proposal.agency_status.map(ReviewStatus::label),
            uploaded: proposal.is_uploaded(),
            submitted_to_department: proposal.submitted_to_department,
            district_note: proposal.district_note.clone(),
        }
    }
}
