use std::fmt;

use serde::Serialize;

use super::domain::{
    DocumentArtifact, DocumentKind, Proposal, ReviewStatus, VillageId, VillageLetterBundle,
};
use super::gateway::WorkflowGateway;

/// Village-level aggregate over the proposals that currently have a file.
/// A proposal in `revision` whose file was deleted drops out of the batch
/// counts entirely; while it still carries a file it counts as rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VillageSubmissionSummary {
    pub village_id: VillageId,
    pub funding_year: u16,
    pub total_uploaded: usize,
    pub total_pending: usize,
    pub total_rejected: usize,
    pub all_reviewed: bool,
    pub missing_berita_acara: usize,
    pub missing_surat_pengantar: usize,
    pub has_all_berita_acara: bool,
    pub has_all_surat_pengantar: bool,
    pub has_village_letters: bool,
}

/// Batch action for one village's reviewed proposal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    ForwardToDepartment,
    ReturnToVillage,
}

/// One specific reason a batch action is not available right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ForwardBlocker {
    NothingUploaded,
    ReviewsOutstanding { pending: usize },
    GatewayClosed,
    MissingBeritaAcara { count: usize },
    MissingSuratPengantar { count: usize },
    MissingVillageLetters,
}

impl fmt::Display for ForwardBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingUploaded => write!(f, "no proposals uploaded"),
            Self::ReviewsOutstanding { pending } => {
                write!(f, "{pending} proposal(s) still pending review")
            }
            Self::GatewayClosed => write!(f, "submission gateway is closed"),
            Self::MissingBeritaAcara { count } => {
                write!(f, "{count} berita acara missing")
            }
            Self::MissingSuratPengantar { count } => {
                write!(f, "{count} surat pengantar missing")
            }
            Self::MissingVillageLetters => write!(f, "village letters missing"),
        }
    }
}

/// Batch action blocked; carries the itemized list of everything missing so
/// the caller can say more than "failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreconditionFailed {
    pub blockers: Vec<ForwardBlocker>,
}

impl fmt::Display for PreconditionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch action blocked: ")?;
        for (index, blocker) in self.blockers.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{blocker}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PreconditionFailed {}

/// Computes village-level aggregate status and decides whether the batch
/// may be forwarded or must be returned. Pure functions over fetched
/// entities; no store access and no framework ties.
pub struct SubmissionAggregator;

impl SubmissionAggregator {
    pub fn summarize(
        village_id: VillageId,
        funding_year: u16,
        proposals: &[Proposal],
        documents: &[DocumentArtifact],
        letters: Option<&VillageLetterBundle>,
    ) -> VillageSubmissionSummary {
        let uploaded: Vec<&Proposal> = proposals.iter().filter(|p| p.is_uploaded()).collect();

        let total_uploaded = uploaded.len();
        let total_pending = uploaded
            .iter()
            .filter(|p| p.district_status == ReviewStatus::Pending)
            .count();
        let total_rejected = uploaded
            .iter()
            .filter(|p| p.district_status == ReviewStatus::Revision)
            .count();

        let has_document = |proposal: &Proposal, kind: DocumentKind| {
            documents
                .iter()
                .any(|doc| doc.proposal_id == proposal.id && doc.kind == kind)
        };
        let missing_berita_acara = uploaded
            .iter()
            .filter(|p| !has_document(p, DocumentKind::BeritaAcara))
            .count();
        let missing_surat_pengantar = uploaded
            .iter()
            .filter(|p| !has_document(p, DocumentKind::SuratPengantar))
            .count();

        VillageSubmissionSummary {
            village_id,
            funding_year,
            total_uploaded,
            total_pending,
            total_rejected,
            all_reviewed: total_pending == 0 && total_uploaded > 0,
            missing_berita_acara,
            missing_surat_pengantar,
            has_all_berita_acara: missing_berita_acara == 0,
            has_all_surat_pengantar: missing_surat_pengantar == 0,
            has_village_letters: letters.is_some(),
        }
    }

    /// Decide the batch action. Rejected items take priority over
    /// forwarding; forwarding is additionally gated on the gateway and on
    /// artifact and letter completeness.
    pub fn decide(
        summary: &VillageSubmissionSummary,
        gateway: WorkflowGateway,
    ) -> Result<BatchAction, PreconditionFailed> {
        if summary.total_uploaded == 0 {
            return Err(PreconditionFailed {
                blockers: vec![ForwardBlocker::NothingUploaded],
            });
        }
        if !summary.all_reviewed {
            return Err(PreconditionFailed {
                blockers: vec![ForwardBlocker::ReviewsOutstanding {
                    pending: summary.total_pending,
                }],
            });
        }
        if summary.total_rejected > 0 {
            return Ok(BatchAction::ReturnToVillage);
        }

        let mut blockers = Vec::new();
        if !gateway.open {
            blockers.push(ForwardBlocker::GatewayClosed);
        }
        if !summary.has_all_berita_acara {
            blockers.push(ForwardBlocker::MissingBeritaAcara {
                count: summary.missing_berita_acara,
            });
        }
        if !summary.has_all_surat_pengantar {
            blockers.push(ForwardBlocker::MissingSuratPengantar {
                count: summary.missing_surat_pengantar,
            });
        }
        if !summary.has_village_letters {
            blockers.push(ForwardBlocker::MissingVillageLetters);
        }

        if blockers.is_empty() {
            Ok(BatchAction::ForwardToDepartment)
        } else {
            Err(PreconditionFailed { blockers })
        }
    }
}
