//! Permission-metadata controller: the closed vocabulary for UI rendering.

use ecliptic_catalog::models::{PermissionActionRow, PermissionTargetRow};
use ecliptic_fault::Result;
use serde::Serialize;

use crate::{AppState, Ctx};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedActionDto {
    pub target_type: String,
    pub action_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionMetadataDto {
    pub actions: Vec<PermissionActionRow>,
    pub allowed_actions_by_type: Vec<AllowedActionDto>,
    pub targets: Vec<PermissionTargetRow>,
}

/// The action vocabulary, the static type constraints, and the targets
/// visible to the caller's organization.
pub async fn targets_and_actions(state: &AppState, ctx: &Ctx) -> Result<PermissionMetadataDto> {
    let actions = state.catalog.actions().await?;
    let allowed_actions_by_type = state
        .catalog
        .allowed_actions_by_type()
        .await?
        .into_iter()
        .map(|(target_type, action_id)| AllowedActionDto {
            target_type,
            action_id,
        })
        .collect();
    let targets = state.catalog.targets(&ctx.organization_id).await?;

    Ok(PermissionMetadataDto {
        actions,
        allowed_actions_by_type,
        targets,
    })
}
