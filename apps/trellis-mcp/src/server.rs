//! # Trellis MCP Server
//!
//! Implements `ServerHandler` with 8 MCP tools that proxy to the Trellis HTTP API.

use crate::client::TrellisClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to a Trellis HTTP API.
#[derive(Clone)]
pub struct TrellisMcp {
    client: TrellisClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ApplicationParams {
    /// The application ID (numeric identifier).
    #[schemars(description = "The application ID (numeric identifier)")]
    pub application_id: u64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetFieldParams {
    /// The application ID.
    #[schemars(description = "The application ID")]
    pub application_id: u64,
    /// The stage name (e.g. 'fund_position', 'collateral_assets').
    #[schemars(description = "The stage name (e.g. 'fund_position', 'collateral_assets')")]
    pub stage: String,
    /// The field name within the stage (e.g. 'fund_name', 'isin_code').
    #[schemars(description = "The field name within the stage (e.g. 'fund_name', 'isin_code')")]
    pub field: String,
    /// The sub-form ID; omit to resolve it from the stage blueprint.
    #[schemars(description = "The sub-form ID; omit to resolve it from the stage blueprint")]
    pub sub_form: Option<String>,
    /// Tagged field value, e.g. {"text":{"value":"Fund A"}} or {"number":{"value":0}}.
    #[schemars(
        description = "Tagged field value, e.g. {\"text\":{\"value\":\"Fund A\"}} or {\"number\":{\"value\":0}}"
    )]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SaveParams {
    /// The application ID.
    #[schemars(description = "The application ID")]
    pub application_id: u64,
    /// Tagged stage payload, e.g. {"fund_position":{"fund_name":...}}.
    #[schemars(description = "Tagged stage payload, e.g. {\"fund_position\":{\"fund_name\":...}}")]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GotoParams {
    /// The application ID.
    #[schemars(description = "The application ID")]
    pub application_id: u64,
    /// The target stage name.
    #[schemars(description = "The target stage name")]
    pub stage: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReferenceParams {
    /// The reference set name (e.g. 'asset_types', 'rating_agencies').
    #[schemars(description = "The reference set name (e.g. 'asset_types', 'rating_agencies')")]
    pub set: String,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl TrellisMcp {
    pub fn new(client: TrellisClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Open a new bond-issuance wizard application")]
    async fn trellis_create(&self) -> Result<CallToolResult, McpError> {
        match self.client.create_application().await {
            Ok(resp) => {
                let text = if let Some(id) = resp.get("application_id").and_then(|v| v.as_u64()) {
                    format!("Application created. ID: {id}")
                } else if let Some(err) = resp.get("error").and_then(|v| v.as_str()) {
                    format!("Create failed: {err}")
                } else {
                    format!("Create response: {resp}")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Show wizard position and per-stage completion for an application")]
    async fn trellis_progress(
        &self,
        params: Parameters<ApplicationParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.application_state(params.0.application_id).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(
                format_state_response(&resp),
            )])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Set one field value on a wizard stage and report the new completion")]
    async fn trellis_set_field(
        &self,
        params: Parameters<SetFieldParams>,
    ) -> Result<CallToolResult, McpError> {
        let SetFieldParams {
            application_id,
            stage,
            field,
            sub_form,
            value,
        } = params.0;
        let body = serde_json::json!({
            "stage": stage,
            "sub_form": sub_form,
            "field": field,
            "value": value,
        });
        match self.client.set_field(application_id, body).await {
            Ok(resp) => {
                let text = if resp.get("success").and_then(|v| v.as_bool()) == Some(true) {
                    let bp = resp
                        .get("stage_basis_points")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0);
                    let complete = resp
                        .get("stage_complete")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    let mut line = format!(
                        "Field '{field}' set on {stage}. Stage at {}.{:02}%{}",
                        bp / 100,
                        bp % 100,
                        if complete { " (complete)" } else { "" }
                    );
                    if let Some(transition) = resp.get("transition").and_then(|v| v.as_str()) {
                        line.push_str(&format!("; stage {transition}"));
                    }
                    line
                } else {
                    let err = resp
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    format!("Set field failed: {err}")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Save (commit) a stage payload for an application")]
    async fn trellis_save(
        &self,
        params: Parameters<SaveParams>,
    ) -> Result<CallToolResult, McpError> {
        let SaveParams {
            application_id,
            payload,
        } = params.0;
        match self.client.save_stage(application_id, payload).await {
            Ok(resp) => {
                let outcome = resp
                    .get("outcome")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let stage = resp.get("stage").and_then(|v| v.as_str()).unwrap_or("?");
                let text = match outcome {
                    "committed" => {
                        let msg = resp.get("message").and_then(|v| v.as_str()).unwrap_or("");
                        format!("Stage {stage} committed. {msg}")
                    }
                    "failed" => {
                        let err = resp
                            .get("error")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown error");
                        format!("Save of {stage} failed, values kept for retry: {err}")
                    }
                    "stale" => format!("Save of {stage} was superseded and discarded."),
                    _ => {
                        let err = resp
                            .get("error")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown error");
                        format!("Save rejected: {err}")
                    }
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Advance the wizard to the next stage (denied if the stage is incomplete)")]
    async fn trellis_next(
        &self,
        params: Parameters<ApplicationParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.go_next(params.0.application_id).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(
                format_navigation_response(&resp),
            )])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Jump to a named wizard stage (backward always, forward only if gated stages are complete)")]
    async fn trellis_goto(
        &self,
        params: Parameters<GotoParams>,
    ) -> Result<CallToolResult, McpError> {
        let GotoParams {
            application_id,
            stage,
        } = params.0;
        match self.client.go_to(application_id, &stage).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(
                format_navigation_response(&resp),
            )])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "List reference data (asset types, charge types, rating agencies, outlooks, depositories)")]
    async fn trellis_references(
        &self,
        params: Parameters<ReferenceParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.reference(&params.0.set).await {
            Ok(resp) => {
                let text = if resp.get("success").and_then(|v| v.as_bool()) == Some(true) {
                    let set = resp.get("set").and_then(|v| v.as_str()).unwrap_or("?");
                    let mut lines = vec![format!("Reference set '{set}':")];
                    if let Some(items) = resp.get("items").and_then(|v| v.as_array()) {
                        for item in items {
                            let code = item.get("code").and_then(|v| v.as_str()).unwrap_or("?");
                            let label = item.get("label").and_then(|v| v.as_str()).unwrap_or("?");
                            lines.push(format!("  {code}: {label}"));
                        }
                    }
                    lines.join("\n")
                } else {
                    let err = resp
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    format!("Reference lookup failed: {err}")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Get current Trellis store statistics (application count, persistence)")]
    async fn trellis_status(&self) -> Result<CallToolResult, McpError> {
        match self.client.status().await {
            Ok(resp) => {
                let count = resp
                    .get("application_count")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let persistent = resp
                    .get("persistent")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let text = format!(
                    "Trellis Status:\n  Applications: {count}\n  Storage: {}",
                    if persistent { "persistent" } else { "in-memory" }
                );
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for TrellisMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Trellis bond-issuance wizard server. Use tools to create \
                 applications, fill stage fields, commit stage payloads, \
                 navigate between stages, and look up reference data."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// Format a wizard state response JSON into human-readable text.
fn format_state_response(resp: &serde_json::Value) -> String {
    if resp.get("success").and_then(|v| v.as_bool()) != Some(true) {
        let err = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return format!("State lookup failed: {err}");
    }

    let mut parts = Vec::new();

    if resp.get("submitted").and_then(|v| v.as_bool()) == Some(true) {
        parts.push("Position: submitted".to_string());
    } else if let Some(position) = resp.get("position").and_then(|v| v.as_str()) {
        parts.push(format!("Position: {position}"));
    }

    if let Some(overall) = resp.get("overall_percent").and_then(|v| v.as_str()) {
        parts.push(format!("Overall: {overall}"));
    }

    if let Some(stages) = resp.get("stages").and_then(|v| v.as_array())
        && !stages.is_empty()
    {
        parts.push(format!("Stages ({}):", stages.len()));
        for stage in stages {
            let title = stage.get("title").and_then(|v| v.as_str()).unwrap_or("?");
            let bp = stage
                .get("basis_points")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let complete = stage
                .get("complete")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let committed = stage
                .get("committed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let mut markers = Vec::new();
            if complete {
                markers.push("complete");
            }
            if committed {
                markers.push("committed");
            }
            let suffix = if markers.is_empty() {
                String::new()
            } else {
                format!(" [{}]", markers.join(", "))
            };
            parts.push(format!("  {title}: {}.{:02}%{suffix}", bp / 100, bp % 100));
        }
    }

    if parts.is_empty() {
        "No state details.".to_string()
    } else {
        parts.join("\n")
    }
}

/// Format a navigation response JSON into human-readable text.
fn format_navigation_response(resp: &serde_json::Value) -> String {
    if resp.get("success").and_then(|v| v.as_bool()) != Some(true) {
        let err = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return format!("Navigation failed: {err}");
    }

    let outcome = resp
        .get("outcome")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    match outcome {
        "moved" => {
            let from = resp.get("from").and_then(|v| v.as_str()).unwrap_or("?");
            let to = resp.get("to").and_then(|v| v.as_str()).unwrap_or("?");
            format!("Moved: {from} -> {to}")
        }
        "submitted" => {
            let from = resp.get("from").and_then(|v| v.as_str()).unwrap_or("?");
            format!("Application submitted from {from}.")
        }
        "denied" => {
            let reason = resp
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("incomplete stage");
            format!("Navigation denied: {reason}")
        }
        other => format!("Navigation outcome: {other}"),
    }
}
