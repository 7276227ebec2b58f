use clap::Args;

use bankeu_workflow::error::AppError;
use bankeu_workflow::workflows::bankeu::{
    AgencyDecision, DistrictId, LetterDecision, LetterKind, LetterReviewStatus, NewProposal,
    Proposal, ProposalStore, VerificationTeamMember, VillageId, VillageLetter,
    VillageLetterBundle, WorkflowError, WorkflowGateway,
};

use crate::infra::{build_workflow_service, ApiWorkflowService, InMemoryProposalStore};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Village identifier for the demo batch
    #[arg(long, default_value = "desa-sukamaju")]
    pub(crate) village: String,
    /// District identifier reviewing the batch
    #[arg(long, default_value = "kec-ciranjang")]
    pub(crate) district: String,
    /// Funding year for the batch
    #[arg(long, default_value_t = 2025)]
    pub(crate) year: u16,
    /// Number of proposals to walk through the pipeline
    #[arg(long, default_value_t = 3)]
    pub(crate) proposals: usize,
    /// Run the batch decision against a closed gateway to show the blockers
    #[arg(long)]
    pub(crate) gateway_closed: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        village,
        district,
        year,
        proposals,
        gateway_closed,
    } = args;

    let village = VillageId(village);
    let district = DistrictId(district);
    let (service, store) = build_workflow_service();

    println!("Bankeu approval workflow demo");
    println!(
        "Village {} | district {} | funding year {}",
        village.0, district.0, year
    );

    println!("\nVillage uploads");
    let mut batch = Vec::new();
    for index in 1..=proposals.max(1) {
        let proposal = service.create_proposal(NewProposal {
            village_id: village.clone(),
            district_id: district.clone(),
            title: format!("Kegiatan desa {index}"),
            requested_budget: 120_000_000 + (index as u64) * 5_000_000,
            funding_year: year,
            activities: Vec::new(),
            file: Some(format!("dokumen proposal {index}").into_bytes()),
        })?;
        println!(
            "- Received {} ({}) -> status {}",
            proposal.id, proposal.title, proposal.district_status
        );
        batch.push(proposal);
    }

    println!("\nDistrict review");
    let revised = revision_round(&service, &batch[0])?;
    batch[0] = revised;
    for proposal in &mut batch {
        *proposal = service.approve_district(&proposal.id)?;
        println!("- {} verified", proposal.id);
    }

    println!("\nAgency track");
    match service.record_agency_decision(&batch[0].id, AgencyDecision::Approved, None) {
        Ok(proposal) => println!(
            "- {} agency status {}",
            proposal.id,
            proposal
                .agency_status
                .map(|s| s.label())
                .unwrap_or("none")
        ),
        Err(err) => println!("- Agency decision unavailable: {err}"),
    }

    println!("\nVerification team");
    for proposal in &batch {
        assign_team(store.as_ref(), proposal)?;
    }
    let team = service.team_status(&batch[0].id)?;
    println!(
        "- {}: {}/{} members complete (all complete: {})",
        batch[0].id, team.complete_members, team.total_members, team.all_complete
    );

    println!("\nDistrict artifacts");
    for (index, proposal) in batch.iter().enumerate() {
        let berita_acara = service.generate_berita_acara(&proposal.id, "camat-demo")?;
        let nomor = format!("{:03}/KEC/{year}", index + 1);
        let surat = service.generate_surat_pengantar(&proposal.id, &nomor)?;
        println!(
            "- {}: berita acara at {} | surat pengantar {} at {}",
            proposal.id, berita_acara.file_path, nomor, surat.file_path
        );
    }

    println!("\nVillage letters");
    store
        .upsert_village_letters(demo_letters(&village, year))
        .map_err(WorkflowError::from)?;
    for kind in [LetterKind::SuratPengantar, LetterKind::SuratPermohonan] {
        let bundle = service.review_letter(&village, year, kind, LetterDecision::Approved, None)?;
        let letter = match kind {
            LetterKind::SuratPengantar => &bundle.surat_pengantar,
            LetterKind::SuratPermohonan => &bundle.surat_permohonan,
        };
        println!("- {} reviewed -> {}", kind.label(), letter.review_status.label());
    }

    let summary = service.village_summary(&village, year)?;
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("\nVillage summary\n{json}"),
        Err(err) => println!("\nVillage summary unavailable: {err}"),
    }

    let gateway = if gateway_closed {
        WorkflowGateway::closed()
    } else {
        WorkflowGateway::open()
    };
    println!(
        "\nBatch decision (gateway {})",
        if gateway.open { "open" } else { "closed" }
    );
    match service.forward_batch(&village, year, gateway) {
        Ok(outcome) => match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Batch outcome unavailable: {err}"),
        },
        Err(WorkflowError::Precondition(failed)) => {
            println!("Batch blocked:");
            for blocker in &failed.blockers {
                println!("- {blocker}");
            }
        }
        Err(err) => return Err(AppError::Workflow(err)),
    }

    Ok(())
}

/// One district rejection plus a village re-upload, so the demo batch shows
/// the revision path before everything is verified.
fn revision_round(
    service: &ApiWorkflowService,
    proposal: &Proposal,
) -> Result<Proposal, WorkflowError> {
    let rejected = service.request_revision(&proposal.id, "RAB belum ditandatangani kepala desa")?;
    println!(
        "- {} returned for revision: {}",
        rejected.id,
        rejected.district_note.as_deref().unwrap_or("(no note)")
    );
    let resubmitted = service.resubmit(&rejected.id, b"dokumen proposal revisi")?;
    println!("- {} re-uploaded -> status {}", resubmitted.id, resubmitted.district_status);
    Ok(resubmitted)
}

fn assign_team(store: &InMemoryProposalStore, proposal: &Proposal) -> Result<(), AppError> {
    for member in 1..=3 {
        store
            .insert_team_member(VerificationTeamMember {
                member_id: format!("tim-{member}"),
                proposal_id: proposal.id.clone(),
                district_id: proposal.district_id.clone(),
                name: format!("Anggota Tim {member}"),
                has_data: true,
                has_questionnaire: true,
                has_signature: true,
            })
            .map_err(WorkflowError::from)?;
    }
    Ok(())
}

fn demo_letters(village: &VillageId, year: u16) -> VillageLetterBundle {
    VillageLetterBundle {
        village_id: village.clone(),
        funding_year: year,
        surat_pengantar: VillageLetter {
            kind: LetterKind::SuratPengantar,
            file_path: "letters/surat-pengantar.pdf".to_string(),
            review_status: LetterReviewStatus::Pending,
            rejection_note: None,
        },
        surat_permohonan: VillageLetter {
            kind: LetterKind::SuratPermohonan,
            file_path: "letters/surat-permohonan.pdf".to_string(),
            review_status: LetterReviewStatus::Pending,
            rejection_note: None,
        },
    }
}
