//! Request body decoding
//!
//! Turns a form-encoded or multipart request body into [`FormData`]. Any other
//! content type decodes to an empty field set.

use std::convert::Infallible;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use thiserror::Error;

use super::schema::FormData;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

/// Body encodings understood by the form decoder
#[derive(Debug, Clone, PartialEq, Eq)]
enum Encoding {
    UrlEncoded,
    Multipart(String),
    Unsupported,
}

fn detect_encoding(headers: &HeaderMap) -> Result<Encoding, FormError> {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(Encoding::Unsupported);
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/x-www-form-urlencoded" => Ok(Encoding::UrlEncoded),
        "multipart/form-data" => Ok(Encoding::Multipart(multer::parse_boundary(content_type)?)),
        _ => Ok(Encoding::Unsupported),
    }
}

/// Read the whole body (at most `limit` bytes) and decode its fields.
pub async fn read_form<B>(headers: &HeaderMap, body: B, limit: u64) -> Result<FormData, FormError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let encoding = detect_encoding(headers)?;
    let bytes = collect_limited(body, limit).await?;

    match encoding {
        Encoding::UrlEncoded => Ok(parse_urlencoded(&bytes)),
        Encoding::Multipart(boundary) => parse_multipart(bytes, boundary).await,
        Encoding::Unsupported => Ok(FormData::default()),
    }
}

async fn collect_limited<B>(body: B, limit: u64) -> Result<Bytes, FormError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(FormError::TooLarge { limit })
        }
        Err(e) => Err(FormError::Body(e.to_string())),
    }
}

pub fn parse_urlencoded(bytes: &[u8]) -> FormData {
    form_urlencoded::parse(bytes).collect()
}

/// Text fields only; uploaded files are skipped.
pub async fn parse_multipart(bytes: Bytes, boundary: String) -> Result<FormData, FormError> {
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(bytes) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut data = FormData::default();

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        let value = field.text().await?;
        data.push(name, value);
    }

    Ok(data)
}
