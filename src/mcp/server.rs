

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{validate_id, Caller, CallerRole, DeletionResponse, DeletionService};
use crate::cascade::{CascadeError, EntityType};
use crate::core::config::{StoreBackend, TeamspaceConfig};


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct TargetParams {
    #[schemars(description = "Entity type, e.g. 'user' or 'space'")]
    pub target_type: String,
    #[schemars(description = "Id of the root entity (ObjectId or UUID)")]
    pub target_id: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct CallerTargetParams {
    #[schemars(description = "Id of the caller requesting the deletion")]
    pub caller_id: String,
    #[schemars(description = "Whether the caller has the admin role (default: false)")]
    pub admin: Option<bool>,
    #[schemars(description = "Entity type, e.g. 'user'")]
    pub target_type: String,
    #[schemars(description = "Id of the entity to delete")]
    pub target_id: String,
}

impl CallerTargetParams {
    fn caller(&self) -> Caller {
        let role = if self.admin.unwrap_or(false) {
            CallerRole::Admin
        } else {
            CallerRole::User
        };
        Caller {
            id: self.caller_id.clone(),
            role,
        }
    }
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct OwnerSummaryParams {
    #[schemars(description = "Id of the admin asking")]
    pub caller_id: String,
    #[schemars(description = "User whose owned workspaces are summarized")]
    pub user_id: String,
}


#[derive(Clone)]
pub struct TeamspaceMcpServer {
    service: Arc<DeletionService>,
    config: Arc<TeamspaceConfig>,
    tool_router: ToolRouter<Self>,
}

impl TeamspaceMcpServer {
    pub fn new(service: DeletionService, config: TeamspaceConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn convert_error(err: CascadeError) -> McpError {
        match err {
            CascadeError::NotFound { .. } | CascadeError::UnknownEntityType(_) => {
                McpError::invalid_params(err.to_string(), None)
            }
            other => McpError::internal_error(other.to_string(), None),
        }
    }

    fn check_target(params: &TargetParams) -> Result<EntityType, McpError> {
        validate_id("targetId", &params.target_id)
            .map_err(|issue| McpError::invalid_params(issue.message, None))?;
        Ok(EntityType::new(params.target_type.as_str()))
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn response_to_result(response: &DeletionResponse) -> Result<CallToolResult, McpError> {
        let json = Self::result_to_json(response)?;
        if response.is_success() {
            Ok(CallToolResult::success(vec![Content::text(json)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(json)]))
        }
    }
}

#[tool_router]
impl TeamspaceMcpServer {
    #[tool(description = "Show the ordered steps a deletion of the target would run right now, without changing anything. Returns: {root_type, root_id, steps: [{entity_type, collection, filter, action}]}")]
    async fn preview_deletion(
        &self,
        Parameters(params): Parameters<TargetParams>,
    ) -> Result<CallToolResult, McpError> {
        let root_type = Self::check_target(&params)?;
        let plan = self
            .service
            .engine()
            .preview(&root_type, &params.target_id)
            .await
            .map_err(Self::convert_error)?;

        info!("Previewed {} steps for {} {}", plan.len(), root_type, params.target_id);
        let json = Self::result_to_json(&plan)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete an entity and everything it owns. Callers may delete their own user; admins may delete anything. Returns: {outcome: success|issue|retryable_failure, ...}")]
    async fn delete_entity(
        &self,
        Parameters(params): Parameters<CallerTargetParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .delete_entity(&params.caller(), &params.target_type, &params.target_id)
            .await;
        if !response.is_success() {
            warn!("Deletion of {} {} did not complete: {:?}", params.target_type, params.target_id, response);
        }
        Self::response_to_result(&response)
    }

    #[tool(description = "Check whether a deletion has converged: nothing owned by the target and no reference to it remains. Returns: {converged, remaining_steps}")]
    async fn verify_deletion(
        &self,
        Parameters(params): Parameters<TargetParams>,
    ) -> Result<CallToolResult, McpError> {
        let root_type = Self::check_target(&params)?;
        let residual = self
            .service
            .engine()
            .preview(&root_type, &params.target_id)
            .await
            .map_err(Self::convert_error)?;

        let json = Self::result_to_json(json!({
            "root_type": root_type,
            "root_id": params.target_id,
            "converged": residual.is_empty(),
            "remaining_steps": residual.len(),
        }))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Finish an interrupted deletion. Same authorization as delete_entity. Safe to call repeatedly; a no-op once nothing is left. Returns: {outcome, ...}")]
    async fn resume_deletion(
        &self,
        Parameters(params): Parameters<CallerTargetParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .resume(&params.caller(), &params.target_type, &params.target_id)
            .await;
        Self::response_to_result(&response)
    }

    #[tool(description = "Admin view of a user: workspaces they own, total team members in them, and spaces in those workspaces. Returns: {userId, workspacesCount, teamMembers, spaceCount}")]
    async fn owner_summary(
        &self,
        Parameters(params): Parameters<OwnerSummaryParams>,
    ) -> Result<CallToolResult, McpError> {
        let summary = self
            .service
            .owner_summary(&Caller::admin(params.caller_id), &params.user_id)
            .await
            .map_err(|issue| McpError::invalid_params(issue.to_string(), None))?;

        let json = Self::result_to_json(&summary)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}


#[tool_handler]
impl ServerHandler for TeamspaceMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "teamspace".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Cascading deletion for the collaboration backend. Run preview_deletion before \
                 delete_entity, and resume_deletion when a deletion reports a retryable failure."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://teamspace", "teamspace-config".to_string()).no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://teamspace" => {
                let graph = self.service.engine().graph();
                let content = serde_json::to_string_pretty(&json!({
                    "config": self.config.as_ref(),
                    "store": self.service.store().backend_name(),
                    "entities": graph.entities().map(|e| e.entity_type.to_string()).collect::<Vec<_>>(),
                    "edges": graph.edges().iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "tools": [
                        "preview_deletion",
                        "delete_entity",
                        "verify_deletion",
                        "resume_deletion",
                        "owner_summary",
                    ],
                }))
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


pub async fn run_server() -> anyhow::Result<()> {
    info!("Initializing Teamspace MCP server");

    let config = TeamspaceConfig::load(std::env::var("TEAMSPACE_CONFIG").ok().as_deref())?;
    let service = DeletionService::from_config(&config).await?;

    info!("Teamspace MCP server ready");
    info!("   Store: {} ({})", config.backend, service.store().backend_name());
    if config.backend == StoreBackend::Helix {
        info!("   HelixDB: {}:{} [{}]", config.host, config.port, config.instance);
    }

    let server = TeamspaceMcpServer::new(service, config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
