

use tracing::debug;

use super::models::{ApiIssue, Caller, OwnerSummary};
use super::service::DeletionService;
use super::validate::validate_id;
use crate::cascade::collab::{OWNER_ROLE, SPACES, TEAM_MEMBERS, WORKSPACES, WORKSPACE_REF};
use crate::cascade::FilterTemplate;
use crate::db::{document_ids, Filter, StoreError, ID_FIELD};

impl DeletionService {
    /// What deleting `user_id` would leave behind in shared workspaces:
    /// workspaces they own, the team members in them and their spaces.
    pub async fn owner_summary(&self, caller: &Caller, user_id: &str) -> Result<OwnerSummary, ApiIssue> {
        if !caller.is_admin() {
            return Err(ApiIssue::forbidden("owner summary is admin only"));
        }
        validate_id("userId", user_id)?;

        let owned = FilterTemplate::membership(TEAM_MEMBERS, Some(&[OWNER_ROLE])).bind(user_id);
        let workspaces = self
            .store()
            .find(WORKSPACES, &owned, &[TEAM_MEMBERS])
            .await
            .map_err(unavailable)?;

        let team_members = workspaces
            .iter()
            .filter_map(|ws| ws.get(TEAM_MEMBERS).and_then(|m| m.as_array()))
            .map(Vec::len)
            .sum();

        let workspace_ids = document_ids(&workspaces);
        let space_count = if workspace_ids.is_empty() {
            0
        } else {
            let in_workspaces = Filter::In {
                field: WORKSPACE_REF.to_string(),
                values: workspace_ids,
            };
            self.store()
                .find(SPACES, &in_workspaces, &[ID_FIELD])
                .await
                .map_err(unavailable)?
                .len()
        };

        debug!("Owner summary for {}: {} workspaces", user_id, workspaces.len());
        Ok(OwnerSummary {
            user_id: user_id.to_string(),
            workspaces_count: workspaces.len(),
            team_members,
            space_count,
        })
    }
}

fn unavailable(err: StoreError) -> ApiIssue {
    ApiIssue::new(503, "store", err.to_string())
}
