use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use bankeu_workflow::workflows::bankeu::{
    DistrictId, DocumentArtifact, DocumentKind, DocumentRenderer, FileStore, GatewaySource,
    Proposal, ProposalId, ProposalStore, ProposalWorkflowService, ReferenceSnapshot, RenderError,
    StoreError, VerificationTeamMember, VillageId, VillageLetterBundle, WorkflowGateway,
};

/// Concrete service wiring for this binary's in-memory adapters.
pub(crate) type ApiWorkflowService =
    ProposalWorkflowService<InMemoryProposalStore, InMemoryFileStore, PlainTextRenderer>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Admin-togglable gateway. Workflow decisions snapshot the value per
/// request through `GatewaySource`; only the admin endpoint writes it.
pub(crate) struct ToggleGateway {
    open: AtomicBool,
}

impl ToggleGateway {
    pub(crate) fn new(initial: WorkflowGateway) -> Self {
        Self {
            open: AtomicBool::new(initial.open),
        }
    }

    pub(crate) fn set(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }
}

impl GatewaySource for ToggleGateway {
    fn current(&self) -> WorkflowGateway {
        WorkflowGateway {
            open: self.open.load(Ordering::Acquire),
        }
    }
}

type DocumentTable = HashMap<(ProposalId, DocumentKind), DocumentArtifact>;
type LetterTable = HashMap<(VillageId, u16), VillageLetterBundle>;

/// Mutex-guarded hash-map store. `submit_batch` stages the whole batch on a
/// clone and swaps it in only when every proposal was found, so a failure
/// partway through leaves the live map untouched.
#[derive(Default)]
pub(crate) struct InMemoryProposalStore {
    proposals: Mutex<HashMap<ProposalId, Proposal>>,
    members: Mutex<Vec<VerificationTeamMember>>,
    documents: Mutex<DocumentTable>,
    letters: Mutex<LetterTable>,
    snapshots: Mutex<HashMap<ProposalId, ReferenceSnapshot>>,
}

impl ProposalStore for InMemoryProposalStore {
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
        let mut staged = guard.clone();
        for (id, version) in batch {
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

/// Byte blobs keyed by synthetic paths. Stands in for object storage.
#[derive(Default)]
pub(crate) struct InMemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    sequence: AtomicU64,
}

impl FileStore for InMemoryFileStore {
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = format!("uploads/{id:06}.bin");
        self.files
            .lock()
            .expect("file mutex poisoned")
            .insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .lock()
            .expect("file mutex poisoned")
            .get(path)
            .cloned()
            .ok_or(StoreError::NotFound)
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
        self.files
            .lock()
            .expect("file mutex poisoned")
            .remove(path)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// Plain-text renderer standing in for the PDF template service.
#[derive(Default)]
pub(crate) struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn render_berita_acara(
        &self,
        proposal: &Proposal,
        team: &[VerificationTeamMember],
    ) -> Result<Vec<u8>, RenderError> {
        let mut body = format!(
            "BERITA ACARA HASIL VERIFIKASI\nProposal: {} ({})\nDesa: {}\nKecamatan: {}\nAnggaran: Rp{}\nTahun: {}\n\nTim verifikasi:\n",
            proposal.title,
            proposal.id,
            proposal.village_id.0,
            proposal.district_id.0,
            proposal.requested_budget,
            proposal.funding_year,
        );
        for member in team {
            body.push_str(&format!("- {} ({})\n", member.name, member.member_id));
        }
        Ok(body.into_bytes())
    }

    fn render_surat_pengantar(
        &self,
        proposal: &Proposal,
        nomor_surat: &str,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(format!(
            "SURAT PENGANTAR\nNomor: {}\nProposal: {} ({})\nDesa: {}\nTahun: {}\n",
            nomor_surat,
            proposal.title,
            proposal.id,
            proposal.village_id.0,
            proposal.funding_year,
        )
        .into_bytes())
    }
}

pub(crate) fn build_workflow_service() -> (Arc<ApiWorkflowService>, Arc<InMemoryProposalStore>) {
    let store = Arc::new(InMemoryProposalStore::default());
    let files = Arc::new(InMemoryFileStore::default());
    let renderer = Arc::new(PlainTextRenderer);
    let service = Arc::new(ProposalWorkflowService::new(store.clone(), files, renderer));
    (service, store)
}
