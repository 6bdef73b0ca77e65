use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    Form,
};

use super::{merge_params, param};
use crate::error::AppError;
use crate::services::bitrix::InstallRequest;
use crate::AppState;

/// Served once installation completes; lets the Bitrix24 installer close the
/// frame.
const INSTALL_FINISH_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Installation Success</title>
    <script src="//api.bitrix24.com/api/v1/"></script>
    <script>
        BX24.init(function(){
            BX24.installFinish();
        });
    </script>
</head>
<body>
    <p>Installation has been finished. You can close this page.</p>
</body>
</html>"#;

pub async fn install(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    form: Option<Form<HashMap<String, String>>>,
) -> Result<Html<&'static str>, AppError> {
    let params = merge_params(query, form);

    let request = InstallRequest {
        code: param(&params, &["code", "CODE"]),
        domain: param(&params, &["domain", "DOMAIN"]),
        member_id: param(&params, &["member_id", "MEMBER_ID"]),
    };

    state.bitrix.install(request).await?;
    Ok(Html(INSTALL_FINISH_PAGE))
}
