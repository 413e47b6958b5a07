use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use retrieval_pipeline::{group_by_original, search, SearchHit};
use serde::{Deserialize, Serialize};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "match", default)]
    match_expr: String,
    #[serde(default)]
    json: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SearchListing {
    pub children: Vec<SearchNode>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchNode {
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub context: String,
}

impl From<Vec<SearchHit>> for SearchListing {
    fn from(hits: Vec<SearchHit>) -> Self {
        Self {
            children: hits
                .into_iter()
                .map(|hit| SearchNode {
                    path: hit.original_path,
                    name: hit.original_name,
                    is_dir: false,
                    context: hit.highlighted,
                })
                .collect(),
        }
    }
}

/// `GET /search?match=..&json=true|false`
pub async fn search_files(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let hits = search(&state.db, &params.match_expr).await?;

    if params.json.as_deref() == Some("true") {
        Ok(Json(SearchListing::from(hits)).into_response())
    } else {
        Ok(Html(render_hits(hits)).into_response())
    }
}

/// One `<li>` per hit, hits of the same original file kept together.
fn render_hits(hits: Vec<SearchHit>) -> String {
    let mut html = String::from("<ul>\n");
    for group in group_by_original(hits) {
        for hit in group.hits {
            html.push_str(&format!(
                "<li><a href=\"{path}{name}\">{path}{name} [part {part}]</a><br>{context}<br></li>\n",
                path = hit.original_path,
                name = hit.original_name,
                part = hit.part,
                context = hit.highlighted,
            ));
        }
    }
    html.push_str("</ul>");
    html
}
