//! Error responder
//!
//! Turns a handled status condition into its dedicated page. The status code
//! of the response always matches the condition, even when the page itself
//! cannot be rendered.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use serde::Serialize;

use crate::error::HttpError;
use crate::http;
use crate::logger;
use crate::render::PageRenderer;

#[derive(Serialize)]
struct ErrorPage {
    status: u16,
    message: String,
}

pub fn respond(error: HttpError, renderer: &PageRenderer) -> Response<Full<Bytes>> {
    let page = ErrorPage {
        status: error.status().as_u16(),
        message: error.to_string(),
    };

    match renderer.render(error.template(), &page) {
        Ok(html) => http::build_html_response(error.status(), html),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to render {}: {e}",
                error.template()
            ));
            http::build_plain_response(error.status(), &page.message)
        }
    }
}
