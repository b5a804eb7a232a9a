//! Portal pages backed by third-party APIs
//!
//! Each handler walks a request through `Received`, an optional
//! `Validating` step for submitted forms, `CallingExternal` when there is
//! something to send, `Rendering` and finally `Responded`.

use hyper::body::{Body, Bytes};
use hyper::{HeaderMap, Method};
use serde::Serialize;

use crate::config::AppState;
use crate::error::AppError;
use crate::form::{read_form, FieldErrors, FormData, FormView, Submission, CSRF_FIELD};
use crate::logger;
use crate::render;

/// Shown in place of API data until something has been submitted
pub const PLACEHOLDER: &str = "Type something first and submit.";

#[derive(Debug, Clone, Copy)]
enum Phase {
    Received,
    Validating,
    CallingExternal,
    Rendering,
    Responded,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::CallingExternal => "calling external",
            Self::Rendering => "rendering",
            Self::Responded => "responded",
        }
    }
}

fn trace(page: &str, phase: Phase) {
    logger::log_debug(&format!("[{page}] {}", phase.as_str()));
}

#[derive(Serialize)]
struct FetchPage {
    data: String,
}

#[derive(Serialize)]
struct PostPage {
    form: FormView,
    data: Option<String>,
}

/// `GET /fetch_api`: one weather call per request, its JSON shown verbatim
pub async fn fetch_api(state: &AppState) -> Result<String, AppError> {
    trace("fetch_api", Phase::Received);

    trace("fetch_api", Phase::CallingExternal);
    let response = state.outbound.send(state.upstream.weather_request()).await?;
    logger::log_debug(&format!("[fetch_api] upstream status {}", response.status_code));

    trace("fetch_api", Phase::Rendering);
    let html = state.renderer.render(
        render::FETCH_API,
        &FetchPage {
            data: response.body_text(),
        },
    )?;

    trace("fetch_api", Phase::Responded);
    Ok(html)
}

/// `GET|POST /post_api`: echo form. A valid submission is sent to the echo
/// service; an invalid one is shown again with its errors and no data.
pub async fn post_api<B>(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: B,
) -> Result<String, AppError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    trace("post_api", Phase::Received);
    let schema = Submission::schema();

    let page = if *method == Method::POST {
        trace("post_api", Phase::Validating);
        let form = read_form(headers, body, state.config.http.max_body_size).await?;
        if form.is_empty() {
            logger::log_debug("[post_api] no form fields in request body");
        }

        match validate(state, &form) {
            Ok(submission) => {
                trace("post_api", Phase::CallingExternal);
                let response = state
                    .outbound
                    .send(state.upstream.echo_request(&submission))
                    .await?;
                logger::log_debug(&format!(
                    "[post_api] upstream status {}",
                    response.status_code
                ));
                PostPage {
                    form: FormView::bind(&schema, Some(&form), None, fresh_token(state)),
                    data: Some(response.body_text()),
                }
            }
            Err(errors) => {
                logger::log_debug(&format!(
                    "[post_api] submission rejected with {} error(s)",
                    errors.len()
                ));
                PostPage {
                    form: FormView::bind(&schema, Some(&form), Some(&errors), fresh_token(state)),
                    data: None,
                }
            }
        }
    } else {
        PostPage {
            form: FormView::bind(&schema, None, None, fresh_token(state)),
            data: Some(PLACEHOLDER.to_string()),
        }
    };

    trace("post_api", Phase::Rendering);
    let html = state.renderer.render(render::POST_API, &page)?;

    trace("post_api", Phase::Responded);
    Ok(html)
}

/// Field rules and the CSRF token are checked together so every problem is
/// reported at once.
fn validate(state: &AppState, form: &FormData) -> Result<Submission, FieldErrors> {
    let submission = Submission::from_form(form);
    let csrf = state.csrf.verify(form.get(CSRF_FIELD));

    match (submission, csrf) {
        (Ok(submission), Ok(())) => Ok(submission),
        (submission, csrf) => {
            let mut errors = FieldErrors::default();
            if let Err(field_errors) = submission {
                errors.merge(field_errors);
            }
            if let Err(e) = csrf {
                errors.add(CSRF_FIELD, e.to_string());
            }
            Err(errors)
        }
    }
}

fn fresh_token(state: &AppState) -> Option<String> {
    state.csrf.is_enabled().then(|| state.csrf.issue())
}
