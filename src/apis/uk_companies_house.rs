use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::apis::get_with_retries;
use crate::apis::opencorporates::Company;
use crate::config::Config;
use crate::error::{MapperError, Result};

/// Companies House allows 600 requests per 5 minutes; half a second
/// between calls stays comfortably under that.
const REQUEST_DELAY: Duration = Duration::from_millis(500);

/// Person with Significant Control (PSC) record: the UK beneficial
/// ownership register. Anyone with 25%+ of shares or voting rights, the
/// right to appoint directors, or significant influence must be listed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonWithSignificantControl {
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub country_of_residence: Option<String>,
    pub natures_of_control: Vec<String>,
    pub notified_on: Option<String>,
    pub ceased_on: Option<String>,
    pub address: Option<Value>,
    pub date_of_birth: Option<Value>,
    /// Distinguishes individual PSCs from corporate ones
    pub kind: Option<String>,
    pub identification: Option<Value>,
}

impl PersonWithSignificantControl {
    pub fn is_individual(&self) -> bool {
        self.kind.as_deref() == Some("individual-person-with-significant-control")
    }

    /// Readable summary of the control types held.
    pub fn control_summary(&self) -> String {
        if self.natures_of_control.is_empty() {
            return "Unknown".to_string();
        }
        self.natures_of_control
            .iter()
            .map(|code| match code.as_str() {
                "ownership-of-shares-25-to-50-percent" => "25-50% shares",
                "ownership-of-shares-50-to-75-percent" => "50-75% shares",
                "ownership-of-shares-75-to-100-percent" => "75-100% shares",
                "voting-rights-25-to-50-percent" => "25-50% voting",
                "voting-rights-50-to-75-percent" => "50-75% voting",
                "voting-rights-75-to-100-percent" => "75-100% voting",
                "right-to-appoint-and-remove-directors" => "appoints directors",
                "significant-influence-or-control" => "significant influence",
                other => other,
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Client for the UK Companies House API.
///
/// Requires a (free) API key, sent as the username of HTTP basic auth.
/// The PSC register is the reason this source exists: it reveals who
/// controls a company, not just who directs it.
pub struct CompaniesHouseClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl CompaniesHouseClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.companies_house.api_key.clone().ok_or_else(|| {
            MapperError::Config(
                "UK_COMPANIES_HOUSE_API_KEY not set; get a free key at \
                 https://developer.company-information.service.gov.uk/"
                    .to_string(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        info!("Initialized Companies House client");
        Ok(Self {
            client,
            base_url: config.companies_house.base_url.clone(),
            api_key,
            max_retries: config.http.max_retries,
        })
    }

    async fn get_json(
        &self,
        path: &str,
        params: Vec<(&'static str, String)>,
        what: &str,
    ) -> Result<Option<Value>> {
        tokio::time::sleep(REQUEST_DELAY).await;
        let url = format!("{}{}", self.base_url, path);
        let response = get_with_retries(
            || {
                self.client
                    .get(&url)
                    .basic_auth(&self.api_key, Some(""))
                    .query(&params)
            },
            self.max_retries,
            what,
        )
        .await?;
        match response {
            Some(resp) => Ok(Some(resp.json::<Value>().await?)),
            None => Ok(None),
        }
    }

    fn items(data: Option<Value>) -> Vec<Value> {
        data.and_then(|mut d| match d.get_mut("items") {
            Some(items) => Some(std::mem::take(items)),
            None => None,
        })
        .and_then(|items| match items {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Search UK companies by name. Results are the raw search items.
    pub async fn search_companies(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        debug!("Searching UK companies: {}", query);
        let params = vec![
            ("q", query.to_string()),
            ("items_per_page", limit.min(100).to_string()),
        ];
        let data = self
            .get_json("/search/companies", params, "UK company search")
            .await?;
        Ok(Self::items(data))
    }

    /// Full company profile, mapped onto the canonical `Company` record.
    pub async fn get_company(&self, company_number: &str) -> Result<Option<Company>> {
        debug!("Getting UK company: {}", company_number);
        let data = match self
            .get_json(
                &format!("/company/{company_number}"),
                Vec::new(),
                "UK company profile",
            )
            .await?
        {
            Some(data) => data,
            None => return Ok(None),
        };

        Ok(Some(company_from_profile(&data)))
    }

    /// Current and past officers of a company.
    pub async fn get_officers(&self, company_number: &str) -> Result<Vec<Value>> {
        debug!("Getting officers for: {}", company_number);
        let data = self
            .get_json(
                &format!("/company/{company_number}/officers"),
                Vec::new(),
                "UK officer list",
            )
            .await?;
        Ok(Self::items(data))
    }

    /// Persons with Significant Control for a company. `include_ceased`
    /// keeps PSCs whose control has ended.
    pub async fn get_persons_significant_control(
        &self,
        company_number: &str,
        include_ceased: bool,
    ) -> Result<Vec<PersonWithSignificantControl>> {
        debug!("Getting PSC for: {}", company_number);
        let data = self
            .get_json(
                &format!("/company/{company_number}/persons-with-significant-control"),
                Vec::new(),
                "UK PSC lookup",
            )
            .await?;

        let psc_list = Self::items(data)
            .into_iter()
            .filter_map(|item| {
                serde_json::from_value::<PersonWithSignificantControl>(item).ok()
            })
            .filter(|psc| include_ceased || psc.ceased_on.is_none())
            .collect();
        Ok(psc_list)
    }
}

/// Map a Companies House profile payload to the canonical record. The
/// registered address arrives as separate parts.
fn company_from_profile(data: &Value) -> Company {
    let opt = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

    let address = data
        .get("registered_office_address")
        .and_then(Value::as_object)
        .map(|addr| {
            [
                "address_line_1",
                "address_line_2",
                "locality",
                "region",
                "postal_code",
                "country",
            ]
            .iter()
            .filter_map(|field| addr.get(*field).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(", ")
        })
        .filter(|s| !s.is_empty());

    Company {
        company_number: opt("company_number").unwrap_or_default(),
        name: opt("company_name").unwrap_or_default(),
        // Always UK for this API
        jurisdiction_code: "gb".to_string(),
        incorporation_date: opt("date_of_creation"),
        company_type: opt("type"),
        current_status: opt("company_status"),
        registered_address: address,
        officers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn psc_parses_and_summarizes_control() {
        let psc: PersonWithSignificantControl = serde_json::from_value(json!({
            "name": "Jane Doe",
            "kind": "individual-person-with-significant-control",
            "natures_of_control": [
                "ownership-of-shares-75-to-100-percent",
                "right-to-appoint-and-remove-directors"
            ],
            "notified_on": "2016-04-06"
        }))
        .unwrap();

        assert!(psc.is_individual());
        assert_eq!(
            psc.control_summary(),
            "75-100% shares, appoints directors"
        );
    }

    #[test]
    fn corporate_psc_and_unknown_codes_pass_through() {
        let psc: PersonWithSignificantControl = serde_json::from_value(json!({
            "kind": "corporate-entity-person-with-significant-control",
            "natures_of_control": ["some-new-control-code"]
        }))
        .unwrap();

        assert!(!psc.is_individual());
        assert_eq!(psc.control_summary(), "some-new-control-code");

        let empty = PersonWithSignificantControl::default();
        assert_eq!(empty.control_summary(), "Unknown");
    }

    #[test]
    fn profile_maps_to_canonical_company() {
        let company = company_from_profile(&json!({
            "company_number": "00026167",
            "company_name": "BARCLAYS BANK PLC",
            "company_status": "active",
            "type": "plc",
            "date_of_creation": "1896-07-20",
            "registered_office_address": {
                "address_line_1": "1 Churchill Place",
                "locality": "London",
                "postal_code": "E14 5HP"
            }
        }));

        assert_eq!(company.jurisdiction_code, "gb");
        assert_eq!(company.name, "BARCLAYS BANK PLC");
        assert_eq!(
            company.registered_address.as_deref(),
            Some("1 Churchill Place, London, E14 5HP")
        );
    }
}
