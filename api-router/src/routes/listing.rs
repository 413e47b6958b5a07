use axum::{
    extract::{Path, Query, Request, State},
    http::{header::LOCATION, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use common::storage::store::ArtifactEntry;
use ingestion_pipeline::pipeline::THUMBNAIL_SUFFIX;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::{api_state::ApiState, error::ApiError};

const FILES_ROOT: &str = "/files/";
/// Served instead of a listing when a directory carries one.
const INDEX_PAGE: &str = "index.html";
/// Side file holding display attributes (`label`, `bg`, `fg`) of its source.
const ATTRIBUTES_SUFFIX: &str = "--attributes.json";
const DERIVED_SEPARATOR: &str = "--";

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    #[serde(default)]
    json: Option<String>,
}

impl ListingParams {
    fn json(&self) -> bool {
        self.json.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DirectoryListing {
    pub children: Vec<DirectoryNode>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    pub name: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub size: u64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(size: &u64) -> bool {
    *size == 0
}

/// `GET /files`
pub async fn redirect_to_root(uri: Uri) -> Response {
    redirect_to_dir(&uri)
}

/// `GET /files/`
pub async fn browse_root(
    State(state): State<ApiState>,
    Query(params): Query<ListingParams>,
) -> Result<Response, ApiError> {
    let entries = state
        .pipeline
        .store()
        .list_dir(FILES_ROOT)
        .await?
        .unwrap_or_default();

    Ok(render_listing(&state, FILES_ROOT, entries, &params).await)
}

/// `GET /{command}/{*path}`: a directory listing, the directory's index page, or the raw file.
pub async fn browse(
    State(state): State<ApiState>,
    Path((command, path)): Path<(String, String)>,
    Query(params): Query<ListingParams>,
    request: Request,
) -> Result<Response, ApiError> {
    if command != "files" {
        return Err(ApiError::NotFound(format!("/{command}/{path}")));
    }

    let dir = format!("{FILES_ROOT}{path}");
    let Some(entries) = state.pipeline.store().list_dir(&dir).await? else {
        return Ok(serve_file(&state, request).await);
    };

    if !path.ends_with('/') {
        return Ok(redirect_to_dir(request.uri()));
    }
    if entries
        .iter()
        .any(|entry| entry.name == INDEX_PAGE && !entry.is_dir)
    {
        return Ok(serve_file(&state, request).await);
    }

    Ok(render_listing(&state, &dir, entries, &params).await)
}

/// Hands the request to the static file service rooted at the data directory.
async fn serve_file(state: &ApiState, request: Request) -> Response {
    match ServeDir::new(state.data_dir()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Adds the missing trailing slash, keeping the query string.
fn redirect_to_dir(uri: &Uri) -> Response {
    let target = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, target)]).into_response()
}

struct ListedEntry {
    entry: ArtifactEntry,
    attributes: Option<Map<String, Value>>,
}

async fn render_listing(
    state: &ApiState,
    dir: &str,
    entries: Vec<ArtifactEntry>,
    params: &ListingParams,
) -> Response {
    let mut listed = Vec::with_capacity(entries.len());
    for entry in entries {
        let attributes = read_attributes(state, dir, &entry.name).await;
        listed.push(ListedEntry { entry, attributes });
    }

    if params.json() {
        Json(DirectoryListing {
            children: listed
                .into_iter()
                .map(|listed| DirectoryNode {
                    attributes: listed.attributes,
                    name: listed.entry.name,
                    is_dir: listed.entry.is_dir,
                    size: listed.entry.size,
                })
                .collect(),
        })
        .into_response()
    } else {
        Html(render_html(&listed)).into_response()
    }
}

/// Attributes stored next to `name`; `None` when absent, empty or unreadable.
async fn read_attributes(state: &ApiState, dir: &str, name: &str) -> Option<Map<String, Value>> {
    let location = state
        .pipeline
        .store()
        .resolve(dir, &format!("{name}{ATTRIBUTES_SUFFIX}"))
        .ok()?;
    let raw = match tokio::fs::read(&location).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(file = %location.display(), error = %err, "could not read attributes");
            return None;
        }
    };

    match serde_json::from_slice::<Map<String, Value>>(&raw) {
        Ok(attributes) if !attributes.is_empty() => Some(attributes),
        Ok(_) => None,
        Err(err) => {
            warn!(file = %location.display(), error = %err, "could not parse attributes");
            None
        }
    }
}

/// One `<li>` per source file; derived files are indented under their source and thumbnails
/// are shown inline instead of being listed.
fn render_html(listed: &[ListedEntry]) -> String {
    let mut html = String::from("<ul>\n");
    let mut source: Option<&str> = None;

    for ListedEntry { entry, attributes } in listed {
        let name = entry.name.as_str();
        if name.ends_with(THUMBNAIL_SUFFIX) {
            continue;
        }

        let derived = source.is_some_and(|source| {
            name.strip_prefix(source)
                .is_some_and(|rest| rest.starts_with(DERIVED_SEPARATOR))
        });
        if derived {
            html.push_str("  <br>&nbsp;&nbsp;\n");
        } else {
            html.push_str("  <br>&nbsp;<li>\n");
            source = Some(name);
        }

        if let Some(badge) = attributes.as_ref().and_then(attribute_badge) {
            html.push_str(&badge);
        }

        let size = if entry.is_dir {
            String::new()
        } else {
            format!(" ({})", human_size(entry.size))
        };
        html.push_str(&format!("<a href=\"{name}\">{name}{size}</a>\n"));

        let thumbnail = format!("{name}{THUMBNAIL_SUFFIX}");
        if listed.iter().any(|other| other.entry.name == thumbnail) {
            html.push_str(&format!(
                "<br><a href=\"{thumbnail}\"><img valign=bottom src=\"{thumbnail}\"></a>\n"
            ));
        }
    }

    html.push_str("</ul>\n");
    html
}

/// Coloured label rendered when `label`, `bg` and `fg` are all strings.
fn attribute_badge(attributes: &Map<String, Value>) -> Option<String> {
    let text = |key: &str| attributes.get(key).and_then(Value::as_str);
    let (label, bg, fg) = (text("label")?, text("bg")?, text("fg")?);
    Some(format!(
        "<span style=\"background-color: {bg};color: {fg}\">{label}</span><br>\n"
    ))
}

fn human_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size > GB {
        format!("{} GB", size / GB)
    } else if size > MB {
        format!("{} MB", size / MB)
    } else if size > KB {
        format!("{} kB", size / KB)
    } else {
        format!("{size} B")
    }
}
