use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    Form,
};
use serde_json::json;

use super::{merge_params, param};
use crate::AppState;

const CONTACT_METHOD: &str = "crm.contact.get";

/// Placement view: fetch the contact named in `PLACEMENT_OPTIONS` and render
/// its fields as a table. Failures render as error text with non-sensitive
/// debug context instead of propagating, since Bitrix24 embeds this page
/// directly in its UI.
pub async fn placement(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    form: Option<Form<HashMap<String, String>>>,
) -> Html<String> {
    let params = merge_params(query, form);
    let body = placement_body(&state, &params).await;
    Html(page(&body))
}

async fn placement_body(state: &AppState, params: &HashMap<String, String>) -> String {
    let options: serde_json::Value = match param(params, &["PLACEMENT_OPTIONS"]) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                return alert(
                    "warning",
                    &format!(
                        "Could not parse PLACEMENT_OPTIONS: {}",
                        html_escape(&e.to_string())
                    ),
                );
            }
        },
        None => json!({}),
    };

    let session_id = param(params, &["AUTH_ID", "APP_SID"]);
    let domain = param(params, &["DOMAIN"]);

    let Some(contact_id) = contact_id_from(&options) else {
        let debug = debug_context(state, params, None, session_id.as_deref(), domain.as_deref()).await;
        return alert(
            "warning",
            &format!(
                "Contact ID not found in PLACEMENT_OPTIONS.<br><strong>Debug context:</strong><pre>{}</pre>",
                html_escape(&debug)
            ),
        );
    };

    let mut api_params = HashMap::from([("ID".to_string(), contact_id.clone())]);
    if let Some(sid) = session_id.clone() {
        // Caller-supplied session auth; the API caller leaves it untouched
        api_params.insert("auth".to_string(), sid);
    }

    match state
        .bitrix
        .call(CONTACT_METHOD, &api_params, false, domain.as_deref())
        .await
    {
        Ok(data) => match data.get("result") {
            Some(serde_json::Value::Object(fields)) => contact_table(fields),
            _ => alert("info", "No contact data found."),
        },
        Err(e) => {
            let debug = debug_context(
                state,
                params,
                Some(&contact_id),
                session_id.as_deref(),
                domain.as_deref(),
            )
            .await;
            alert(
                "danger",
                &format!(
                    "Error fetching contact: {}<br><strong>Debug context:</strong><pre>{}</pre>",
                    html_escape(&e.to_string()),
                    html_escape(&debug)
                ),
            )
        }
    }
}

/// Placements name the contact id differently per entity and version.
fn contact_id_from(options: &serde_json::Value) -> Option<String> {
    ["ID", "ENTITY_ID", "entityId", "id"]
        .iter()
        .find_map(|key| match options.get(*key)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Context rendered alongside errors. Session ids are truncated; tokens and
/// secrets never appear here.
async fn debug_context(
    state: &AppState,
    params: &HashMap<String, String>,
    contact_id: Option<&str>,
    session_id: Option<&str>,
    domain: Option<&str>,
) -> String {
    let installed = match state.store.get().await {
        Ok(Some(settings)) => Some(settings.is_installed()),
        Ok(None) => Some(false),
        Err(_) => None,
    };

    let mut received: Vec<&str> = params.keys().map(String::as_str).collect();
    received.sort_unstable();

    serde_json::to_string_pretty(&json!({
        "contact_id": contact_id,
        "domain": domain,
        "session_id": session_id.map(truncate_id),
        "received_params": received,
        "installed": installed,
    }))
    .unwrap_or_default()
}

fn truncate_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{}...", prefix)
}

fn contact_table(fields: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut rows = String::new();
    for (field, value) in fields {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            html_escape(field),
            html_escape(&display_value(value))
        ));
    }
    format!("<table class=\"table table-striped\">{}</table>", rows)
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn alert(kind: &str, content: &str) -> String {
    format!(
        "<div class=\"alert alert-{}\" role=\"alert\">{}</div>",
        kind, content
    )
}

fn page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <script src="//api.bitrix24.com/api/v1/"></script>
    <title>Contact Details</title>
</head>
<body class="container">
    {}
</body>
</html>"#,
        body
    )
}
