//! Multi-authority approval workflow for Bankeu village financial-assistance
//! proposals: district review, the optional agency track, verification-team
//! gating, one-shot document artifacts, reference snapshots, and the
//! village-level batch decision toward the department.

pub mod aggregate;
pub mod documents;
pub mod domain;
pub mod gateway;
pub mod review;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod team;

#[cfg(test)]
mod tests;

pub use aggregate::{
    BatchAction, ForwardBlocker, PreconditionFailed, SubmissionAggregator,
    VillageSubmissionSummary,
};
pub use documents::{ArtifactGenerationError, DocumentGateEngine, GateNotSatisfiedError};
pub use domain::{
    Activity, ActivityCategory, ArtifactDetail, DistrictId, DocumentArtifact, DocumentKind,
    LetterKind, LetterReviewStatus, MemberGap, MemberTask, Proposal, ProposalId,
    ReferenceSnapshot, ReviewStatus, TeamCompletionStatus, VerificationTeamMember, VillageId,
    VillageLetter, VillageLetterBundle,
};
pub use gateway::{GatewaySource, StaticGateway, WorkflowGateway};
pub use review::{
    AgencyDecision, InvalidStateError, LetterDecision, ReviewError, ReviewStateMachine,
    ValidationError,
};
pub use router::{proposal_router, status_for};
pub use service::{BatchOutcome, NewProposal, ProposalWorkflowService, WorkflowError};
pub use snapshot::{ComparisonView, ReferenceSnapshotManager};
pub use store::{
    DocumentRenderer, FileStore, ProposalStore, ProposalStatusView, RenderError, StoreError,
};
pub use team::TeamCompletionTracker;
