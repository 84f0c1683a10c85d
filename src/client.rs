//! eCFR Client (C1): thin GET wrapper over the eCFR and (indirectly) Federal Register APIs.
//!
//! Grounded on `original_source/ecfr_fetcher/fetcher.py`'s `ECFRFetcher` (900s timeout,
//! 404 -> empty) and the teacher's own `reqwest::get` + `RateLimiter::throttle` idiom from
//! `citations_of_part`/`make_fr_doc_db` in `rust_rewrite/src/main.rs`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_utils::RateLimiter;

use crate::error::PipelineError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

/// Minimum spacing between outbound requests, shared across all calls a client makes. Keeps
/// a multi-worker dispatcher from hammering the upstream API (spec §4.1 "generous timeout,
/// shared pool").
const THROTTLE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
pub struct AgenciesDoc {
    pub agencies: Vec<crate::models::Agency>,
}

#[derive(Debug, Deserialize)]
pub struct TitlesDoc {
    pub titles: Vec<crate::models::Title>,
}

#[derive(Debug, Deserialize, Default)]
pub struct VersionsDoc {
    pub content_versions: Vec<crate::models::TitleVersion>,
}

/// Wire shape of one entry in `admin/v1/agencies.json`'s `agencies` array. The eCFR API
/// doesn't carry an `agency_id` field; the Python original derives it (and `slug`) from the
/// same `slug` key (`original_source/ecfr_fetcher/fetcher.py::process_agencies`).
#[derive(Debug, Deserialize)]
struct AgencyWire {
    slug: String,
    name: String,
    short_name: Option<String>,
    display_name: String,
    sortable_name: Option<String>,
    #[serde(default)]
    cfr_references: Vec<crate::models::DocumentReference>,
}

#[derive(Debug, Deserialize)]
struct AgenciesWireDoc {
    agencies: Vec<AgencyWire>,
}

impl From<AgencyWire> for crate::models::Agency {
    fn from(wire: AgencyWire) -> Self {
        crate::models::Agency {
            agency_id: wire.slug.clone(),
            name: wire.name,
            short_name: wire.short_name,
            display_name: wire.display_name,
            sortable_name: wire.sortable_name,
            docs: wire.cfr_references,
            slug: wire.slug,
        }
    }
}

/// Wire shape of one entry in `versioner/v1/versions/title-N.json`'s `content_versions`
/// array. The date field is `date`, not `version_date`, and `title_number` isn't present at
/// all — the caller already knows which title it asked for
/// (`original_source/ecfr_fetcher/fetcher.py::process_title_versions`).
#[derive(Debug, Deserialize)]
struct TitleVersionWire {
    #[serde(rename = "date")]
    version_date: chrono::NaiveDate,
    amendment_date: Option<chrono::NaiveDate>,
    issue_date: Option<chrono::NaiveDate>,
    identifier: Option<String>,
    name: Option<String>,
    part: Option<String>,
    substantive: Option<bool>,
    removed: Option<bool>,
    subpart: Option<String>,
    r#type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct VersionsWireDoc {
    #[serde(default)]
    content_versions: Vec<TitleVersionWire>,
}

impl TitleVersionWire {
    fn into_domain(self, title_number: i32) -> crate::models::TitleVersion {
        crate::models::TitleVersion {
            title_number,
            version_date: self.version_date,
            amendment_date: self.amendment_date,
            issue_date: self.issue_date,
            identifier: self.identifier,
            name: self.name,
            part: self.part,
            substantive: self.substantive,
            removed: self.removed,
            subpart: self.subpart,
            r#type: self.r#type,
        }
    }
}

pub struct EcfrClient {
    http: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl EcfrClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builder should not fail with default TLS config");
        Self {
            http,
            base_url: base_url.into(),
            limiter: RateLimiter::new(THROTTLE_INTERVAL),
        }
    }

    pub async fn fetch_agencies(&self) -> Result<AgenciesDoc, PipelineError> {
        let wire: AgenciesWireDoc = self
            .get_json(&format!("{}/admin/v1/agencies.json", self.base_url))
            .await?;
        Ok(AgenciesDoc {
            agencies: wire.agencies.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn fetch_titles(&self) -> Result<TitlesDoc, PipelineError> {
        self.get_json(&format!("{}/versioner/v1/titles.json", self.base_url))
            .await
    }

    pub async fn fetch_title_versions(
        &self,
        title_number: i32,
    ) -> Result<VersionsDoc, PipelineError> {
        let url = format!(
            "{}/versioner/v1/versions/title-{}.json",
            self.base_url, title_number
        );
        let wire: VersionsWireDoc = match self.get(&url).await? {
            Some(resp) => resp.json().await?,
            None => VersionsWireDoc::default(),
        };
        Ok(VersionsDoc {
            content_versions: wire
                .content_versions
                .into_iter()
                .map(|v| v.into_domain(title_number))
                .collect(),
        })
    }

    pub async fn fetch_full_title(
        &self,
        title_number: i32,
        version_date: chrono::NaiveDate,
    ) -> Result<String, PipelineError> {
        let url = format!(
            "{}/versioner/v1/full/{}/title-{}.xml",
            self.base_url,
            version_date.format("%Y-%m-%d"),
            title_number
        );
        match self.get(&url).await? {
            Some(resp) => Ok(resp.text().await?),
            None => Ok(String::new()),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PipelineError> {
        let resp = self
            .get(url)
            .await?
            .ok_or_else(|| PipelineError::Data(format!("unexpected 404 for {url}")))?;
        Ok(resp.json().await?)
    }

    /// GETs `url`, returning `Ok(None)` on a documented 404 and an error on any other
    /// non-2xx status (spec §4.1).
    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>, PipelineError> {
        let http = self.http.clone();
        let url = url.to_string();
        let resp = self
            .limiter
            .throttle(move || {
                let http = http.clone();
                let url = url.clone();
                async move { http.get(&url).send().await }
            })
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status()?;
        Ok(Some(resp))
    }
}
