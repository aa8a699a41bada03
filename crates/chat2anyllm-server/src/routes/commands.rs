//! Slash commands typed into the chat box.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chat2anyllm_core::command::{self, SlashCommand};
use chat2anyllm_core::validate::{escape_html, Validator};
use chat2anyllm_store::Role;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::json_body;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/commands", post(run_command))
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    input: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommandReply {
    text: String,
    /// Set when `/role <name>` matched, so the client can select it.
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

impl CommandReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: None,
        }
    }
}

/// POST /api/commands
async fn run_command(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandReply>, ApiError> {
    let req = json_body(payload)?;

    let mut v = Validator::new();
    let input = v.required("input", req.input.as_deref(), 1, 1000);
    v.finish().map_err(ApiError::Validation)?;

    let parsed = input.as_deref().and_then(SlashCommand::parse);
    let Some(cmd) = parsed else {
        return Err(ApiError::BadRequest("Not a slash command".into()));
    };
    debug!(command = ?cmd, "running slash command");

    let reply = match cmd {
        SlashCommand::ListRoles => {
            let names: Vec<String> = state
                .store()?
                .list_roles()?
                .into_iter()
                .map(|r| r.name)
                .collect();
            CommandReply::text(command::format_role_list(&names))
        }
        SlashCommand::SelectRole(name) if name.is_empty() => CommandReply::text(command::ROLE_USAGE),
        SlashCommand::SelectRole(name) => {
            // Stored names are HTML-escaped.
            match state.store()?.find_role_by_name(&escape_html(&name))? {
                Some(role) => CommandReply {
                    text: command::role_selected(&role.name),
                    role: Some(role),
                },
                None => CommandReply::text(command::role_not_found(&name)),
            }
        }
        SlashCommand::Unknown(_) => CommandReply::text(command::UNKNOWN_COMMAND),
    };
    Ok(Json(reply))
}
