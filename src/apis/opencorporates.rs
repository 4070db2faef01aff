use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::apis::get_with_retries;
use crate::config::Config;
use crate::error::Result;
use crate::ftm::record::coerce_str;

/// Canonical company record, shared across registry sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    /// Official registration number within the jurisdiction
    pub company_number: String,
    pub name: String,
    /// ISO-style code, e.g. "gb" or "us_de"
    pub jurisdiction_code: String,
    pub incorporation_date: Option<String>,
    pub company_type: Option<String>,
    pub current_status: Option<String>,
    pub registered_address: Option<String>,
    #[serde(default)]
    pub officers: Vec<Officer>,
}

impl Company {
    /// Identifier unique across jurisdictions
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.jurisdiction_code, self.company_number)
    }
}

impl std::fmt::Display for Company {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}/{})",
            self.name, self.jurisdiction_code, self.company_number
        )
    }
}

/// Company officer (director, secretary, ...) record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Officer {
    pub name: String,
    pub position: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub nationality: Option<String>,
    pub occupation: Option<String>,
}

/// One hit from the officer search endpoint, with its company association.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfficerSearchHit {
    pub name: String,
    pub position: Option<String>,
    pub company_name: String,
    pub company_number: String,
    pub jurisdiction_code: String,
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn req_str(value: &Value, key: &str) -> String {
    value.get(key).map(coerce_str).unwrap_or_default()
}

/// Build a `Company` from one `{"company": {...}}` API payload.
fn company_from_value(data: &Value) -> Company {
    let officers = data
        .get("officers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|wrapper| wrapper.get("officer"))
                .map(|officer| Officer {
                    name: req_str(officer, "name"),
                    position: opt_str(officer, "position"),
                    start_date: opt_str(officer, "start_date"),
                    end_date: opt_str(officer, "end_date"),
                    nationality: opt_str(officer, "nationality"),
                    occupation: opt_str(officer, "occupation"),
                })
                .collect()
        })
        .unwrap_or_default();

    Company {
        company_number: req_str(data, "company_number"),
        name: req_str(data, "name"),
        jurisdiction_code: req_str(data, "jurisdiction_code"),
        incorporation_date: opt_str(data, "incorporation_date"),
        company_type: opt_str(data, "company_type"),
        current_status: opt_str(data, "current_status"),
        registered_address: opt_str(data, "registered_address_in_full"),
        officers,
    }
}

/// Client for the OpenCorporates REST API.
///
/// The API token is optional; authenticated requests get higher rate
/// limits. Better suited to targeted lookups than bulk analysis.
pub struct OpenCorporatesClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    rate_limit_delay: Duration,
}

impl OpenCorporatesClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        info!(
            "Initialized OpenCorporates client (authenticated={})",
            config.opencorporates.api_key.is_some()
        );
        Ok(Self {
            client,
            base_url: config.opencorporates.base_url.clone(),
            api_key: config.opencorporates.api_key.clone(),
            max_retries: config.http.max_retries,
            rate_limit_delay: config.rate_limit_delay(),
        })
    }

    fn params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_token", key.clone()));
        }
        params
    }

    async fn get_json(
        &self,
        url: &str,
        params: Vec<(&'static str, String)>,
        what: &str,
    ) -> Result<Option<Value>> {
        tokio::time::sleep(self.rate_limit_delay).await;
        let params = self.params(params);
        let response = get_with_retries(
            || self.client.get(url).query(&params),
            self.max_retries,
            what,
        )
        .await?;
        match response {
            Some(resp) => Ok(Some(resp.json::<Value>().await?)),
            None => Ok(None),
        }
    }

    /// Search for companies by name, optionally filtered by jurisdiction,
    /// country, or status. The API caps pages at 100 results.
    pub async fn search_companies(
        &self,
        query: &str,
        jurisdiction_code: Option<&str>,
        country_code: Option<&str>,
        status: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Company>> {
        debug!("Searching companies: query={}", query);

        let mut params = vec![
            ("q", query.to_string()),
            ("per_page", limit.min(100).to_string()),
        ];
        if let Some(code) = jurisdiction_code {
            params.push(("jurisdiction_code", code.to_string()));
        }
        if let Some(code) = country_code {
            params.push(("country_code", code.to_string()));
        }
        if let Some(status) = status {
            params.push(("current_status", status.to_string()));
        }

        let url = format!("{}/companies/search", self.base_url);
        let data = match self.get_json(&url, params, "company search").await? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        let companies = data
            .pointer("/results/companies")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|result| result.get("company"))
                    .take(limit)
                    .map(company_from_value)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        debug!("Search returned {} companies", companies.len());
        Ok(companies)
    }

    /// Look up a single company with its officers. `None` when the
    /// registry has no such company.
    pub async fn get_company(
        &self,
        jurisdiction_code: &str,
        company_number: &str,
    ) -> Result<Option<Company>> {
        debug!("Getting company: {}/{}", jurisdiction_code, company_number);

        let url = format!(
            "{}/companies/{}/{}",
            self.base_url, jurisdiction_code, company_number
        );
        let data = match self.get_json(&url, Vec::new(), "company lookup").await? {
            Some(data) => data,
            None => return Ok(None),
        };

        Ok(data.pointer("/results/company").map(company_from_value))
    }

    /// Search for officers by name across all registered companies.
    pub async fn search_officers(
        &self,
        query: &str,
        jurisdiction_code: Option<&str>,
        limit: usize,
    ) -> Result<Vec<OfficerSearchHit>> {
        debug!("Searching officers: query={}", query);

        let mut params = vec![
            ("q", query.to_string()),
            ("per_page", limit.min(100).to_string()),
        ];
        if let Some(code) = jurisdiction_code {
            params.push(("jurisdiction_code", code.to_string()));
        }

        let url = format!("{}/officers/search", self.base_url);
        let data = match self.get_json(&url, params, "officer search").await? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        let hits = data
            .pointer("/results/officers")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|result| result.get("officer"))
                    .take(limit)
                    .map(|officer| {
                        let company = officer.get("company").cloned().unwrap_or(Value::Null);
                        OfficerSearchHit {
                            name: req_str(officer, "name"),
                            position: opt_str(officer, "position"),
                            company_name: req_str(&company, "name"),
                            company_number: req_str(&company, "company_number"),
                            jurisdiction_code: req_str(&company, "jurisdiction_code"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }
}
