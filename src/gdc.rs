use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::{ProjectId, QueryProfile};
use crate::error::ReconError;

/// Page size for modality file/case queries.
pub const PAGE_SIZE: u64 = 20_000;
/// Page size for the clinical/survival sweeps, which pull whole projects.
pub const PAGE_SIZE_WIDE: u64 = 2_000_000;

/// Boolean filter tree in the repository's `{op, content}` wire shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", content = "content", rename_all = "lowercase")]
pub enum Filter {
    And(Vec<Filter>),
    In(FieldIn),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldIn {
    pub field: String,
    pub value: Vec<String>,
}

impl Filter {
    pub fn and(filters: Vec<Filter>) -> Filter {
        Filter::And(filters)
    }

    pub fn field_in<S: Into<String>>(field: &str, values: impl IntoIterator<Item = S>) -> Filter {
        Filter::In(FieldIn {
            field: field.to_string(),
            value: values.into_iter().map(Into::into).collect(),
        })
    }
}

/// Filter for the cases endpoint: which cases own at least one file of the
/// modality. File axes are `files.`-prefixed on this endpoint.
pub fn cases_filter(project: &ProjectId, profile: &QueryProfile) -> Filter {
    let mut clauses = vec![
        Filter::field_in("cases.project.project_id", [project.as_str()]),
        Filter::field_in("files.analysis.workflow_type", [profile.workflow_type]),
        Filter::field_in("files.data_category", [profile.data_category]),
        Filter::field_in("files.data_type", [profile.gdc_data_type]),
        Filter::field_in(
            "files.experimental_strategy",
            [profile.experimental_strategy],
        ),
    ];
    if let Some(platform) = profile.platform {
        clauses.push(Filter::field_in("files.platform", [platform]));
    }
    if profile.open_access {
        clauses.push(Filter::field_in("files.access", ["open"]));
    }
    Filter::and(clauses)
}

/// Filter for the files endpoint: the concrete file manifest for the
/// modality, restricted to the expected samples.
pub fn files_filter(project: &ProjectId, profile: &QueryProfile, samples: &[String]) -> Filter {
    let mut clauses = vec![Filter::field_in(
        "cases.project.project_id",
        [project.as_str()],
    )];
    if !profile.workflow_type.is_empty() {
        clauses.push(Filter::field_in(
            "analysis.workflow_type",
            [profile.workflow_type],
        ));
    }
    clauses.push(Filter::field_in("data_category", [profile.data_category]));
    clauses.push(Filter::field_in("data_type", [profile.gdc_data_type]));
    clauses.push(Filter::field_in(
        "experimental_strategy",
        [profile.experimental_strategy],
    ));
    if let Some(platform) = profile.platform {
        clauses.push(Filter::field_in("platform", [platform]));
    }
    if profile.open_access {
        clauses.push(Filter::field_in("access", ["open"]));
    }
    if !samples.is_empty() {
        clauses.push(Filter::field_in(
            "cases.samples.submitter_id",
            samples.iter().map(String::as_str),
        ));
    }
    if profile.tumor_only {
        clauses.push(Filter::field_in("cases.samples.tissue_type", ["tumor"]));
    }
    Filter::and(clauses)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Cases,
    Files,
    Projects,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Cases => "cases",
            Endpoint::Files => "files",
            Endpoint::Projects => "projects",
        }
    }
}

#[derive(Serialize)]
struct QueryParams {
    filters: String,
    fields: String,
    format: &'static str,
    size: u64,
}

pub trait GdcClient: Send + Sync {
    /// POST a filtered, field-limited query and return the unpeeled
    /// `data.hits` records.
    fn query(
        &self,
        endpoint: Endpoint,
        filter: &Filter,
        fields: &[&str],
        size: u64,
    ) -> Result<Vec<JsonValue>, ReconError>;

    /// The queryable field names of the files endpoint (`files/_mapping`).
    fn field_mapping(&self) -> Result<Vec<String>, ReconError>;

    /// Per-case survival records (`analysis/survival` donors).
    fn survival(&self, project: &ProjectId) -> Result<Vec<JsonValue>, ReconError>;
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    base_url: String,
}

impl GdcHttpClient {
    pub fn new() -> Result<Self, ReconError> {
        Self::with_base_url("https://api.gdc.cancer.gov".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, ReconError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("xena-recon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReconError::GdcHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ReconError::GdcHttp(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ReconError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ReconError::GdcHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ReconError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GDC request failed".to_string());
        Err(ReconError::GdcStatus { status, message })
    }
}

/// Pull the hit list out of a `{data: {hits: [...]}}` response body.
pub fn unpeel_hits(body: JsonValue) -> Result<Vec<JsonValue>, ReconError> {
    match body.get("data").and_then(|data| data.get("hits")) {
        Some(JsonValue::Array(hits)) => Ok(hits.clone()),
        _ => Err(ReconError::MalformedRecord(
            "response body missing data.hits".to_string(),
        )),
    }
}

impl GdcClient for GdcHttpClient {
    fn query(
        &self,
        endpoint: Endpoint,
        filter: &Filter,
        fields: &[&str],
        size: u64,
    ) -> Result<Vec<JsonValue>, ReconError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let params = QueryParams {
            filters: serde_json::to_string(filter)
                .map_err(|err| ReconError::GdcHttp(err.to_string()))?,
            fields: fields.join(","),
            format: "json",
            size,
        };
        let response = self.send_with_retries(|| self.client.post(&url).json(&params))?;
        let response = Self::handle_status(response)?;
        let body: JsonValue = response
            .json()
            .map_err(|err| ReconError::GdcHttp(err.to_string()))?;
        unpeel_hits(body)
    }

    fn field_mapping(&self) -> Result<Vec<String>, ReconError> {
        let url = format!("{}/files/_mapping", self.base_url);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        let body: JsonValue = response
            .json()
            .map_err(|err| ReconError::GdcHttp(err.to_string()))?;
        match body.get("fields") {
            Some(JsonValue::Array(fields)) => Ok(fields
                .iter()
                .filter_map(|field| field.as_str().map(str::to_string))
                .collect()),
            _ => Err(ReconError::MalformedRecord(
                "files/_mapping response missing fields".to_string(),
            )),
        }
    }

    fn survival(&self, project: &ProjectId) -> Result<Vec<JsonValue>, ReconError> {
        let url = format!("{}/analysis/survival", self.base_url);
        let filter = Filter::field_in("cases.project.project_id", [project.as_str()]);
        let params = QueryParams {
            filters: serde_json::to_string(&filter)
                .map_err(|err| ReconError::GdcHttp(err.to_string()))?,
            fields: String::new(),
            format: "json",
            size: PAGE_SIZE_WIDE,
        };
        let response = self.send_with_retries(|| self.client.post(&url).json(&params))?;
        let response = Self::handle_status(response)?;
        let body: JsonValue = response
            .json()
            .map_err(|err| ReconError::GdcHttp(err.to_string()))?;
        match body
            .get("results")
            .and_then(|results| results.get(0))
            .and_then(|first| first.get("donors"))
        {
            Some(JsonValue::Array(donors)) => Ok(donors.clone()),
            _ => Err(ReconError::MalformedRecord(
                "survival response missing results[0].donors".to_string(),
            )),
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
