use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{
    ArtifactDetail, DocumentArtifact, DocumentKind, Proposal, ReviewStatus, TeamCompletionStatus,
};
use super::review::ValidationError;
use super::store::{DocumentRenderer, FileStore, ProposalStore, RenderError, StoreError};
use super::team::TeamCompletionTracker;

/// Artifact generation preconditions that were not met, carried verbatim so
/// callers can present an actionable message.
#[derive(Debug, thiserror::Error)]
pub enum GateNotSatisfiedError {
    #[error("proposal is {found}, must be verified before generating documents")]
    ProposalNotVerified { found: ReviewStatus },
    #[error("no verification team assigned to the proposal")]
    NoTeamAssigned,
    #[error("verification team incomplete: {complete} of {total} members done")]
    TeamIncomplete { total: usize, complete: usize },
    #[error("{kind} already generated for this proposal")]
    AlreadyGenerated { kind: DocumentKind },
}

/// Rendering failed after the bounded retries; safe to retry with backoff.
/// No `file_path` is recorded when this is returned.
#[derive(Debug, thiserror::Error)]
#[error("rendering {kind} failed after {attempts} attempts: {last}")]
pub struct ArtifactGenerationError {
    pub kind: DocumentKind,
    pub attempts: u32,
    #[source]
    pub last: RenderError,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gate(#[from] GateNotSatisfiedError),
    #[error(transparent)]
    Generation(#[from] ArtifactGenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

const MAX_RENDER_ATTEMPTS: u32 = 3;

/// Decides whether a required artifact may be generated and records it once
/// generated. Both generation calls are one-shot.
pub struct DocumentGateEngine<S, F, D> {
    store: Arc<S>,
    files: Arc<F>,
    renderer: Arc<D>,
}

impl<S, F, D> DocumentGateEngine<S, F, D>
where
    S: ProposalStore,
    F: FileStore,
    D: DocumentRenderer,
{
    pub fn new(store: Arc<S>, files: Arc<F>, renderer: Arc<D>) -> Self {
        Self {
            store,
            files,
            renderer,
        }
    }

    /// Generate the official district verification report. Requires a
    /// verified proposal, a fully complete verification team, and no
    /// existing berita acara.
    pub fn generate_berita_acara(
        &self,
        proposal: &Proposal,
        author_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DocumentArtifact, DocumentError> {
        self.require_verified(proposal)?;
        self.require_absent(proposal, DocumentKind::BeritaAcara)?;

        let members = self.store.team_members(&proposal.id)?;
        let team = TeamCompletionTracker::evaluate(&members);
        require_team_complete(&team)?;

        let bytes = self.render_with_retry(DocumentKind::BeritaAcara, || {
            self.renderer.render_berita_acara(proposal, &members)
        })?;

        self.persist(
            proposal,
            DocumentKind::BeritaAcara,
            bytes,
            now,
            ArtifactDetail::BeritaAcara {
                author_id: author_id.to_string(),
            },
        )
    }

    /// Generate the district cover letter. Requires a verified proposal, a
    /// non-empty letter number, and no existing surat pengantar.
    pub fn generate_surat_pengantar(
        &self,
        proposal: &Proposal,
        nomor_surat: &str,
        now: DateTime<Utc>,
    ) -> Result<DocumentArtifact, DocumentError> {
        let nomor_surat = nomor_surat.trim();
        if nomor_surat.is_empty() {
            return Err(ValidationError::EmptyNomorSurat.into());
        }
        self.require_verified(proposal)?;
        self.require_absent(proposal, DocumentKind::SuratPengantar)?;

        let bytes = self.render_with_retry(DocumentKind::SuratPengantar, || {
            self.renderer.render_surat_pengantar(proposal, nomor_surat)
        })?;

        self.persist(
            proposal,
            DocumentKind::SuratPengantar,
            bytes,
            now,
            ArtifactDetail::SuratPengantar {
                nomor_surat: nomor_surat.to_string(),
            },
        )
    }

    fn require_verified(&self, proposal: &Proposal) -> Result<(), GateNotSatisfiedError> {
        if proposal.district_status != ReviewStatus::Verified {
            return Err(GateNotSatisfiedError::ProposalNotVerified {
                found: proposal.district_status,
            });
        }
        Ok(())
    }

    fn require_absent(
        &self,
        proposal: &Proposal,
        kind: DocumentKind,
    ) -> Result<(), DocumentError> {
        if self.store.find_document(&proposal.id, kind)?.is_some() {
            return Err(GateNotSatisfiedError::AlreadyGenerated { kind }.into());
        }
        Ok(())
    }

    fn render_with_retry(
        &self,
        kind: DocumentKind,
        render: impl Fn() -> Result<Vec<u8>, RenderError>,
    ) -> Result<Vec<u8>, ArtifactGenerationError> {
        let mut last = None;
        for attempt in 1..=MAX_RENDER_ATTEMPTS {
            match render() {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    warn!(%kind, attempt, error = %err, "document rendering attempt failed");
                    last = Some(err);
                }
            }
        }
        Err(ArtifactGenerationError {
            kind,
            attempts: MAX_RENDER_ATTEMPTS,
            last: last.unwrap_or_else(|| RenderError("renderer produced no output".to_string())),
        })
    }

    fn persist(
        &self,
        proposal: &Proposal,
        kind: DocumentKind,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
        detail: ArtifactDetail,
    ) -> Result<DocumentArtifact, DocumentError> {
        let file_path = self.files.store(&bytes)?;
        let artifact = DocumentArtifact {
            proposal_id: proposal.id.clone(),
            kind,
            file_path: file_path.clone(),
            generated_at: now,
            detail,
        };

        // The store rejects a duplicate row, closing the check-then-act
        // window between `require_absent` and this insert. Losing that race
        // leaves the file just written without a record, so drop it.
        match self.store.insert_document(artifact) {
            Ok(stored) => Ok(stored),
            Err(StoreError::Conflict) => {
                if let Err(err) = self.files.remove(&file_path) {
                    warn!(%kind, path = %file_path, error = %err, "failed to clean up unrecorded file");
                }
                Err(GateNotSatisfiedError::AlreadyGenerated { kind }.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn require_team_complete(team: &TeamCompletionStatus) -> Result<(), GateNotSatisfiedError> {
    if team.total_members == 0 {
        return Err(GateNotSatisfiedError::NoTeamAssigned);
    }
    if !team.all_complete {
        return Err(GateNotSatisfiedError::TeamIncomplete {
            total: team.total_members,
            complete: team.complete_members,
        });
    }
    Ok(())
}
