use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for funding proposals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for the originating village (desa).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VillageId(pub String);

/// Identifier wrapper for the reviewing district (kecamatan).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistrictId(pub String);

/// Per-authority review state for a proposal.
///
/// `districtStatus` is authoritative for district-level gating; the agency
/// track reuses the same domain on its own field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Verified,
    Revision,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Revision => "revision",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Infrastructure,
    NonInfrastructure,
}

impl ActivityCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::NonInfrastructure => "non_infrastructure",
        }
    }
}

/// One funded activity inside a proposal. Read-only from the workflow's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub category: ActivityCategory,
    pub volume: String,
    pub location: String,
}

/// One funding request owned by exactly one village.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub village_id: VillageId,
    pub district_id: DistrictId,
    pub title: String,
    pub requested_budget: u64,
    pub funding_year: u16,
    pub activities: Vec<Activity>,
    /// Reference into the file store; `None` means nothing is uploaded.
    pub file_path: Option<String>,
    pub district_status: ReviewStatus,
    pub agency_status: Option<ReviewStatus>,
    pub district_note: Option<String>,
    pub agency_note: Option<String>,
    pub submitted_to_department: bool,
    pub submitted_to_department_at: Option<DateTime<Utc>>,
    /// Set when the district last requested a revision; survives the
    /// village's re-upload so comparison views know a rejection happened.
    pub revision_requested_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent village re-submission.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Deprecated global status carried for audit parity only. No gating
    /// decision reads this field.
    pub legacy_status: Option<ReviewStatus>,
    /// Optimistic-concurrency token bumped by the store on every update.
    pub version: u64,
}

impl Proposal {
    pub fn is_uploaded(&self) -> bool {
        self.file_path.is_some()
    }
}

/// Verification-team sub-tasks each member completes independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberTask {
    Data,
    Questionnaire,
    Signature,
}

impl MemberTask {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Questionnaire => "questionnaire",
            Self::Signature => "signature",
        }
    }
}

/// One verification-team member assigned to a (proposal, district) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTeamMember {
    pub member_id: String,
    pub proposal_id: ProposalId,
    pub district_id: DistrictId,
    pub name: String,
    pub has_data: bool,
    pub has_questionnaire: bool,
    pub has_signature: bool,
}

impl VerificationTeamMember {
    pub fn is_complete(&self) -> bool {
        self.has_data && self.has_questionnaire && self.has_signature
    }

    pub fn missing_tasks(&self) -> Vec<MemberTask> {
        let mut missing = Vec::new();
        if !self.has_data {
            missing.push(MemberTask::Data);
        }
        if !self.has_questionnaire {
            missing.push(MemberTask::Questionnaire);
        }
        if !self.has_signature {
            missing.push(MemberTask::Signature);
        }
        missing
    }
}

/// Outstanding sub-tasks for one member, surfaced for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberGap {
    pub member_id: String,
    pub name: String,
    pub missing: Vec<MemberTask>,
}

/// Derived completion state for a proposal's verification team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCompletionStatus {
    pub total_members: usize,
    pub complete_members: usize,
    pub all_complete: bool,
    pub gaps: Vec<MemberGap>,
}

/// Generated document artifacts gating batch forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    BeritaAcara,
    SuratPengantar,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::BeritaAcara => "berita acara",
            Self::SuratPengantar => "surat pengantar",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provenance recorded alongside a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactDetail {
    BeritaAcara { author_id: String },
    SuratPengantar { nomor_surat: String },
}

/// A generated artifact record. Existence of the record means the document
/// was generated; artifacts are one-shot and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentArtifact {
    pub proposal_id: ProposalId,
    pub kind: DocumentKind,
    pub file_path: String,
    pub generated_at: DateTime<Utc>,
    pub detail: ArtifactDetail,
}

/// District review state for one village-level letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl LetterReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// The two village-level letters reviewed independently per funding year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterKind {
    SuratPengantar,
    SuratPermohonan,
}

impl LetterKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SuratPengantar => "surat pengantar",
            Self::SuratPermohonan => "surat permohonan",
        }
    }
}

/// One village letter with its independent district review trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageLetter {
    pub kind: LetterKind,
    pub file_path: String,
    pub review_status: LetterReviewStatus,
    pub rejection_note: Option<String>,
}

/// Cover letter plus request letter, one bundle per village per year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageLetterBundle {
    pub village_id: VillageId,
    pub funding_year: u16,
    pub surat_pengantar: VillageLetter,
    pub surat_permohonan: VillageLetter,
}

impl VillageLetterBundle {
    pub fn letter_mut(&mut self, kind: LetterKind) -> &mut VillageLetter {
        match kind {
            LetterKind::SuratPengantar => &mut self.surat_pengantar,
            LetterKind::SuratPermohonan => &mut self.surat_permohonan,
        }
    }
}

/// Immutable copy of a proposal's file frozen at the first agency decision.
/// Used only for side-by-side comparison, never for status transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub proposal_id: ProposalId,
    pub snapshot_path: String,
    pub decision: ReviewStatus,
    pub decided_at: DateTime<Utc>,
}
