use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;

use super::render::{render_page, Page};
use super::AppState;
use crate::errors::{Result, SegError};
use crate::model::Variant;
use crate::pipeline;
use crate::session::{Session, MASK_FILE};
use crate::store::MaskStore;

const UPLOAD_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let variant = match state.model.variant() {
        Variant::Instance => "instance",
        Variant::Semantic => "semantic",
    };
    Html(render_page(Page::Index, &[("VARIANT", variant)]))
}

// ---------------------------------------------------------------------------
// POST /waiting
// ---------------------------------------------------------------------------

pub async fn waiting(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut multipart: Multipart,
) -> Result<(Session, Html<String>)> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;

    let AppState { model, store, .. } = state;
    let mask_name = tokio::task::spawn_blocking(move || -> Result<String> {
        let image = pipeline::decode_image(&bytes)?;
        let mask = pipeline::segment(model.as_ref(), &image)?;
        store.save(&mask)
    })
    .await
    .map_err(|e| SegError::Model {
        operation: "inference task".to_string(),
        source: Box::new(e),
    })??;

    tracing::info!(upload = %file_name, mask = %mask_name, "mask generated");

    let session = Session::new(jar).insert(MASK_FILE, mask_name);
    Ok((session, Html(render_page(Page::Waiting, &[]))))
}

/// Pulls the `image` file part out of the form.
///
/// Parts without a `filename` are not files and are skipped, so a plain text
/// field called `image` still counts as missing.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, axum::body::Bytes)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(SegError::Upload {
                reason: "Empty file.",
            });
        }
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(SegError::Upload {
                reason: "Empty file.",
            });
        }
        return Ok((file_name, bytes));
    }
    Err(SegError::Upload {
        reason: "No image received.",
    })
}

// ---------------------------------------------------------------------------
// GET /response
// ---------------------------------------------------------------------------

pub async fn response(jar: SignedCookieJar) -> Response {
    match Session::new(jar).get(MASK_FILE) {
        Some(name) => {
            let url = MaskStore::url_for(&name);
            Html(render_page(Page::Response, &[("MASK_URL", &url)])).into_response()
        }
        None => Redirect::to("/").into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /static/masks/:name
// ---------------------------------------------------------------------------

pub async fn mask_file(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let Some(path) = state.store.resolve(&name) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(StatusCode::NOT_FOUND.into_response())
        }
        Err(e) => Err(SegError::FileSystem {
            path,
            operation: "read mask".to_string(),
            source: e,
        }),
    }
}
