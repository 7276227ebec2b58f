use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::bankeu::domain::{
    Activity, ActivityCategory, DistrictId, DocumentArtifact, DocumentKind, LetterKind,
    LetterReviewStatus, Proposal, ProposalId, ReferenceSnapshot, ReviewStatus,
    VerificationTeamMember, VillageId, VillageLetter, VillageLetterBundle,
};
use crate::workflows::bankeu::service::ProposalWorkflowService;
use crate::workflows::bankeu::store::{
    DocumentRenderer, FileStore, ProposalStore, RenderError, StoreError,
};

pub(super) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub(super) fn activity() -> Activity {
    Activity {
        name: "Perbaikan jalan desa".to_string(),
        category: ActivityCategory::Infrastructure,
        volume: "400 m".to_string(),
        location: "Dusun Krajan".to_string(),
    }
}

pub(super) fn proposal(id: &str, village: &str) -> Proposal {
    Proposal {
        id: ProposalId(id.to_string()),
        village_id: VillageId(village.to_string()),
        district_id: DistrictId("kec-01".to_string()),
        title: format!("Bankeu proposal {id}"),
        requested_budget: 150_000_000,
        funding_year: 2025,
        activities: vec![activity()],
        file_path: Some(format!("uploads/{id}.pdf")),
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
    }
}

pub(super) fn member(
    member_id: &str,
    proposal_id: &ProposalId,
    complete: bool,
) -> VerificationTeamMember {
    VerificationTeamMember {
        member_id: member_id.to_string(),
        proposal_id: proposal_id.clone(),
        district_id: DistrictId("kec-01".to_string()),
        name: format!("Verifier {member_id}"),
        has_data: complete,
        has_questionnaire: complete,
        has_signature: complete,
    }
}

pub(super) fn letters(village: &str, funding_year: u16) -> VillageLetterBundle {
    VillageLetterBundle {
        village_id: VillageId(village.to_string()),
        funding_year,
        surat_pengantar: VillageLetter {
            kind: LetterKind::SuratPengantar,
            file_path: format!("letters/{village}-pengantar.pdf"),
            review_status: LetterReviewStatus::Pending,
            rejection_note: None,
        },
        surat_permohonan: VillageLetter {
            kind: LetterKind::SuratPermohonan,
            file_path: format!("letters/{village}-permohonan.pdf"),
            review_status: LetterReviewStatus::Pending,
            rejection_note: None,
        },
    }
}

type DocumentTable = HashMap<(ProposalId, DocumentKind), DocumentArtifact>;
type LetterTable = HashMap<(VillageId, u16), VillageLetterBundle>;

/// In-memory store implementing the full `ProposalStore` contract, with a
/// switch to make `submit_batch` fail mid-batch so atomicity is observable.
#[derive(Default)]
pub(super) struct MemoryStore {
    proposals: Mutex<HashMap<ProposalId, Proposal>>,
    members: Mutex<Vec<VerificationTeamMember>>,
    documents: Mutex<DocumentTable>,
    letters: Mutex<LetterTable>,
    snapshots: Mutex<HashMap<ProposalId, ReferenceSnapshot>>,
    /// When set, `submit_batch` fails after staging this many writes.
    pub(super) fail_batch_after: Mutex<Option<usize>>,
    /// When set, this proposal's stored version is bumped at the start of
    /// `submit_batch`, standing in for a concurrent writer that slipped in
    /// between the caller's decision and the batch write.
    pub(super) bump_before_batch: Mutex<Option<ProposalId>>,
    /// When set, the next `insert_document` call reports `Conflict` even for
    /// a fresh row, standing in for a concurrent generator that landed its
    /// record between the existence check and this insert.
    pub(super) conflict_next_document_insert: Mutex<bool>,
}

impl MemoryStore {
    pub(super) fn seed_proposal(&self, proposal: Proposal) {
        self.proposals
            .lock()
            .expect("store mutex poisoned")
            .insert(proposal.id.clone(), proposal);
    }

    pub(super) fn seed_member(&self, member: VerificationTeamMember) {
        self.members.lock().expect("store mutex poisoned").push(member);
    }

    pub(super) fn seed_letters(&self, bundle: VillageLetterBundle) {
        self.letters
            .lock()
            .expect("store mutex poisoned")
            .insert((bundle.village_id.clone(), bundle.funding_year), bundle);
    }

    pub(super) fn proposal(&self, id: &ProposalId) -> Option<Proposal> {
        self.proposals
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
    }

    pub(super) fn snapshot_count(&self) -> usize {
        self.snapshots.lock().expect("store mutex poisoned").len()
    }
}

impl ProposalStore for MemoryStore {
    fn insert(&self, proposal: Proposal) -> Result<Proposal, StoreError> {
        let mut guard = self.proposals.lock().expect("store mutex poisoned");
        if guard.contains_key(&proposal.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(proposal.id.clone(), proposal.clone());
        Ok(proposal)
    }

    fn fetch(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        let guard = self.proposals.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, mut proposal: Proposal) -> Result<Proposal, StoreError> {
        let mut guard = self.proposals.lock().expect("store mutex poisoned");
        let current = guard.get(&proposal.id).ok_or(StoreError::NotFound)?;
        if current.version != proposal.version {
            return Err(StoreError::VersionConflict);
        }
        proposal.version += 1;
        guard.insert(proposal.id.clone(), proposal.clone());
        Ok(proposal)
    }

    fn list_by_village(
        &self,
        village: &VillageId,
        funding_year: u16,
    ) -> Result<Vec<Proposal>, StoreError> {
        let guard = self.proposals.lock().expect("store mutex poisoned");
        let mut proposals: Vec<Proposal> = guard
            .values()
            .filter(|p| &p.village_id == village && p.funding_year == funding_year)
            .cloned()
            .collect();
        proposals.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(proposals)
    }

    fn list_by_district(
        &self,
        district: &DistrictId,
        funding_year: u16,
    ) -> Result<Vec<Proposal>, StoreError> {
        let guard = self.proposals.lock().expect("store mutex poisoned");
        let mut proposals: Vec<Proposal> = guard
            .values()
            .filter(|p| &p.district_id == district && p.funding_year == funding_year)
            .cloned()
            .collect();
        proposals.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(proposals)
    }

    fn team_members(&self, id: &ProposalId) -> Result<Vec<VerificationTeamMember>, StoreError> {
        let guard = self.members.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|m| &m.proposal_id == id)
            .cloned()
            .collect())
    }

    fn insert_team_member(&self, member: VerificationTeamMember) -> Result<(), StoreError> {
        let mut guard = self.members.lock().expect("store mutex poisoned");
        if guard
            .iter()
            .any(|m| m.member_id == member.member_id && m.proposal_id == member.proposal_id)
        {
            return Err(StoreError::Conflict);
        }
        guard.push(member);
        Ok(())
    }

    fn update_team_member(&self, member: VerificationTeamMember) -> Result<(), StoreError> {
        let mut guard = self.members.lock().expect("store mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|m| m.member_id == member.member_id && m.proposal_id == member.proposal_id)
            .ok_or(StoreError::NotFound)?;
        *slot = member;
        Ok(())
    }

    fn find_document(
        &self,
        id: &ProposalId,
        kind: DocumentKind,
    ) -> Result<Option<DocumentArtifact>, StoreError> {
        let guard = self.documents.lock().expect("store mutex poisoned");
        Ok(guard.get(&(id.clone(), kind)).cloned())
    }

    fn insert_document(
        &self,
        artifact: DocumentArtifact,
    ) -> Result<DocumentArtifact, StoreError> {
        let mut race = self
            .conflict_next_document_insert
            .lock()
            .expect("store mutex poisoned");
        if std::mem::take(&mut *race) {
            return Err(StoreError::Conflict);
        }
        drop(race);
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        let key = (artifact.proposal_id.clone(), artifact.kind);
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, artifact.clone());
        Ok(artifact)
    }

    fn village_letters(
        &self,
        village: &VillageId,
        funding_year: u16,
    ) -> Result<Option<VillageLetterBundle>, StoreError> {
        let guard = self.letters.lock().expect("store mutex poisoned");
        Ok(guard.get(&(village.clone(), funding_year)).cloned())
    }

    fn upsert_village_letters(&self, bundle: VillageLetterBundle) -> Result<(), StoreError> {
        let mut guard = self.letters.lock().expect("store mutex poisoned");
        guard.insert((bundle.village_id.clone(), bundle.funding_year), bundle);
        Ok(())
    }

    fn find_snapshot(&self, id: &ProposalId) -> Result<Option<ReferenceSnapshot>, StoreError> {
        let guard = self.snapshots.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_snapshot(
        &self,
        snapshot: ReferenceSnapshot,
    ) -> Result<ReferenceSnapshot, StoreError> {
        let mut guard = self.snapshots.lock().expect("store mutex poisoned");
        if guard.contains_key(&snapshot.proposal_id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(snapshot.proposal_id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    fn submit_batch(
        &self,
        batch: &[(ProposalId, u64)],
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut guard = self.proposals.lock().expect("store mutex poisoned");
        let fail_after = *self.fail_batch_after.lock().expect("store mutex poisoned");

        if let Some(id) = self.bump_before_batch.lock().expect("store mutex poisoned").take() {
            if let Some(proposal) = guard.get_mut(&id) {
                proposal.version += 1;
            }
        }

        // Stage every write against a scratch copy; commit only if the whole
        // batch succeeded, mirroring a transactional rollback.
        let mut staged = guard.clone();
        for (index, (id, version)) in batch.iter().enumerate() {
            if fail_after == Some(index) {
                return Err(StoreError::Unavailable(
                    "batch write interrupted".to_string(),
                ));
            }
            let proposal = staged.get_mut(id).ok_or(StoreError::NotFound)?;
            if proposal.version != *version {
                return Err(StoreError::VersionConflict);
            }
            proposal.submitted_to_department = true;
            proposal.submitted_to_department_at = Some(at);
            proposal.version += 1;
        }
        *guard = staged;
        Ok(())
    }
}

/// In-memory file store issuing sequential paths.
#[derive(Default)]
pub(super) struct MemoryFiles {
    files: Mutex<HashMap<String, Vec<u8>>>,
    sequence: AtomicU64,
}

impl MemoryFiles {
    pub(super) fn seed(&self, path: &str, bytes: &[u8]) {
        self.files
            .lock()
            .expect("file mutex poisoned")
            .insert(path.to_string(), bytes.to_vec());
    }

    pub(super) fn file_count(&self) -> usize {
        self.files.lock().expect("file mutex poisoned").len()
    }
}

impl FileStore for MemoryFiles {
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = format!("files/{id:06}.bin");
        self.files
            .lock()
            .expect("file mutex poisoned")
            .insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let guard = self.files.lock().expect("file mutex poisoned");
        guard.get(path).cloned().ok_or(StoreError::NotFound)
    }

    fn copy_as_snapshot(&self, path: &str) -> Result<String, StoreError> {
        let bytes = self.read(path)?;
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let snapshot_path = format!("snapshots/{id:06}.bin");
        self.files
            .lock()
            .expect("file mutex poisoned")
            .insert(snapshot_path.clone(), bytes);
        Ok(snapshot_path)
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let mut guard = self.files.lock().expect("file mutex poisoned");
        guard.remove(path).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Renderer double producing deterministic bytes.
#[derive(Default)]
pub(super) struct StaticRenderer;

impl DocumentRenderer for StaticRenderer {
    fn render_berita_acara(
        &self,
        proposal: &Proposal,
        team: &[VerificationTeamMember],
    ) -> Result<Vec<u8>, RenderError> {
        Ok(format!("berita acara {} ({} verifiers)", proposal.id, team.len()).into_bytes())
    }

    fn render_surat_pengantar(
        &self,
        proposal: &Proposal,
        nomor_surat: &str,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(format!("surat pengantar {nomor_surat} for {}", proposal.id).into_bytes())
    }
}

/// Renderer double that fails a fixed number of times before succeeding.
#[derive(Default)]
pub(super) struct FlakyRenderer {
    pub(super) failures_remaining: AtomicU32,
    pub(super) calls: AtomicU32,
}

impl FlakyRenderer {
    pub(super) fn failing(times: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        }
    }

    fn attempt(&self) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.failures_remaining.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::Relaxed);
            return Err(RenderError("template service timed out".to_string()));
        }
        Ok(b"rendered".to_vec())
    }
}

impl DocumentRenderer for FlakyRenderer {
    fn render_berita_acara(
        &self,
        _proposal: &Proposal,
        _team: &[VerificationTeamMember],
    ) -> Result<Vec<u8>, RenderError> {
        self.attempt()
    }

    fn render_surat_pengantar(
        &self,
        _proposal: &Proposal,
        _nomor_surat: &str,
    ) -> Result<Vec<u8>, RenderError> {
        self.attempt()
    }
}

pub(super) type TestService = ProposalWorkflowService<MemoryStore, MemoryFiles, StaticRenderer>;

pub(super) fn build_service() -> (Arc<TestService>, Arc<MemoryStore>, Arc<MemoryFiles>) {
    let store = Arc::new(MemoryStore::default());
    let files = Arc::new(MemoryFiles::default());
    let renderer = Arc::new(StaticRenderer);
    let service = Arc::new(ProposalWorkflowService::new(
        store.clone(),
        files.clone(),
        renderer,
    ));
    (service, store, files)
}

/// Seed one uploaded proposal (with its file bytes present) and return it.
pub(super) fn seed_uploaded(
    store: &MemoryStore,
    files: &MemoryFiles,
    id: &str,
    village: &str,
) -> Proposal {
    let proposal = proposal(id, village);
    files.seed(
        proposal.file_path.as_deref().expect("fixture has a file"),
        b"original upload",
    );
    store.seed_proposal(proposal.clone());
    proposal
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
