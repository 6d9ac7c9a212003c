//! Stateless request builder and response parser for the exercise catalog.
//!
//! # Design
//! `ExerciseApi` holds the base URL and provider headers and nothing else.
//! Every logical operation validates its input and returns a `Call<T>`: the
//! request to send plus the parser for the matching response. Executing a
//! `Call` is the only step that differs between the blocking and the
//! suspendable facade, so both produce the same values and the same error
//! classification for the same response.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ExerciseConfig;
use crate::error::{ApiError, ValidationError};
use crate::http::{AsyncTransport, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::{Exercise, ExerciseImage, FilterType, Page, ReferenceListName};

pub const API_KEY_HEADER: &str = "x-rapidapi-key";
pub const API_HOST_HEADER: &str = "x-rapidapi-host";

pub const DEFAULT_SEARCH_LIMIT: i64 = 10;
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Turns an `HttpResponse` into the operation's result.
pub type Parser<T> = fn(&HttpResponse) -> Result<T, ApiError>;

/// A built request paired with the parser for its response.
#[derive(Clone)]
pub struct Call<T> {
    request: HttpRequest,
    parse: Parser<T>,
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call").field("request", &self.request).finish_non_exhaustive()
    }
}

impl<T> Call<T> {
    fn new(request: HttpRequest, parse: Parser<T>) -> Self {
        Self { request, parse }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn parse(&self, response: &HttpResponse) -> Result<T, ApiError> {
        (self.parse)(response)
    }

    /// Run the exchange on the calling thread.
    pub fn execute<X: Transport + ?Sized>(self, transport: &X) -> Result<T, ApiError> {
        debug!(url = %self.request.url, "blocking exchange");
        let response = transport.execute(self.request)?;
        (self.parse)(&response)
    }

    /// Run the exchange, suspending the calling task while it is in flight.
    pub async fn execute_async<X: AsyncTransport + ?Sized>(self, transport: &X) -> Result<T, ApiError> {
        debug!(url = %self.request.url, "async exchange");
        let response = transport.execute(self.request).await?;
        (self.parse)(&response)
    }
}

/// Request builder for the catalog endpoints.
#[derive(Debug, Clone)]
pub struct ExerciseApi {
    base_url: Url,
    headers: Vec<(String, String)>,
}

impl ExerciseApi {
    pub fn new(config: &ExerciseConfig) -> Result<Self, ValidationError> {
        let raw = config.base_url();
        let base_url = Url::parse(&raw).map_err(|e| ValidationError::InvalidBaseUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ValidationError::InvalidBaseUrl {
                url: raw,
                reason: "URL cannot be a base".to_string(),
            });
        }
        Ok(Self {
            base_url,
            headers: vec![
                (API_KEY_HEADER.to_string(), config.api_key.clone()),
                (API_HOST_HEADER.to_string(), config.host.clone()),
            ],
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn check_status(&self) -> Call<Value> {
        Call::new(self.get(&["status"], Vec::new()), parse_json::<Value>)
    }

    pub fn search_exercises(
        &self,
        filter_type: &str,
        value: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Call<Vec<Exercise>>, ValidationError> {
        let filter: FilterType = filter_type.parse()?;
        let value = path_value("search value", value)?;
        let page = Page::new(limit, offset)?;
        Ok(Call::new(
            self.get(&["exercises", filter.as_str(), value], page_query(page)),
            parse_json::<Vec<Exercise>>,
        ))
    }

    pub fn get_exercise_by_id(&self, id: &str) -> Result<Call<Exercise>, ValidationError> {
        let id = path_value("exercise id", id)?;
        Ok(Call::new(
            self.get(&["exercises", "exercise", id], Vec::new()),
            parse_json::<Exercise>,
        ))
    }

    pub fn list_all_exercises(&self, limit: i64, offset: i64) -> Result<Call<Vec<Exercise>>, ValidationError> {
        let page = Page::new(limit, offset)?;
        Ok(Call::new(
            self.get(&["exercises"], page_query(page)),
            parse_json::<Vec<Exercise>>,
        ))
    }

    pub fn reference_list(&self, name: ReferenceListName) -> Call<Vec<String>> {
        Call::new(
            self.get(&["exercises", name.as_str()], Vec::new()),
            parse_json::<Vec<String>>,
        )
    }

    pub fn exercise_image(&self, id: &str) -> Result<Call<ExerciseImage>, ValidationError> {
        let id = path_value("exercise id", id)?;
        Ok(Call::new(self.get(&["image", id], Vec::new()), parse_image))
    }

    fn get(&self, segments: &[&str], query: Vec<(String, String)>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.endpoint(segments),
            query,
            headers: self.headers.clone(),
        }
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }
}

/// A caller value placed in a single path segment.
///
/// `.` and `..` cannot be percent-encoded and would be resolved away,
/// silently targeting another endpoint.
fn path_value<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    match value {
        "" => Err(ValidationError::Empty(field)),
        "." | ".." => Err(ValidationError::DotSegment {
            field,
            value: value.to_string(),
        }),
        _ => Ok(value),
    }
}

fn page_query(page: Page) -> Vec<(String, String)> {
    vec![
        ("limit".to_string(), page.limit.to_string()),
        ("offset".to_string(), page.offset.to_string()),
    ]
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body_text(),
    })
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn parse_image(response: &HttpResponse) -> Result<ExerciseImage, ApiError> {
    check_status(response)?;
    match response.header("content-type") {
        Some(ct) if ct.contains("json") => parse_json(response).map(ExerciseImage::Locator),
        Some(ct) => Ok(ExerciseImage::Raw {
            content_type: Some(ct.to_string()),
            bytes: response.body.clone(),
        }),
        // Untyped body: a locator if it decodes, raw bytes otherwise.
        None => Ok(serde_json::from_slice(&response.body)
            .map(ExerciseImage::Locator)
            .unwrap_or_else(|_| ExerciseImage::Raw {
                content_type: None,
                bytes: response.body.clone(),
            })),
    }
}
