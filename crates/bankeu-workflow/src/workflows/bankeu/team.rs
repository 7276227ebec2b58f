use super::domain::{MemberGap, TeamCompletionStatus, VerificationTeamMember};

/// Evaluates whether every assigned verification-team member has finished
/// their three sub-tasks. Pure read/aggregate over fetched rows.
pub struct TeamCompletionTracker;

impl TeamCompletionTracker {
    /// An empty team is never complete: a berita acara must not be generated
    /// with no verifiers on record.
    pub fn evaluate(members: &[VerificationTeamMember]) -> TeamCompletionStatus {
        let total_members = members.len();
        let mut complete_members = 0;
        let mut gaps = Vec::new();

        for member in members {
            if member.is_complete() {
                complete_members += 1;
            } else {
                gaps.push(MemberGap {
                    member_id: member.member_id.clone(),
                    name: member.name.clone(),
                    missing: member.missing_tasks(),
                });
            }
        }

        TeamCompletionStatus {
            total_members,
            complete_members,
            all_complete: total_members > 0 && complete_members == total_members,
            gaps,
        }
    }
}
