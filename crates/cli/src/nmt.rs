//! GUGiK NMT `GetHByPointList` client.
//!
//! One blocking GET per call. Retry and batching live in the library's
//! enrichment client; this type only maps HTTP outcomes onto
//! `LookupError::{Transient, Config}`.

use std::collections::HashMap;
use std::time::Duration;

use diffh::api::{CoordKey, ElevationLookup, LookupError};
use reqwest::Url;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://services.gugik.gov.pl/nmt/";
const USER_AGENT: &str = concat!("diffh/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

pub struct NmtLookup {
    http: reqwest::blocking::Client,
    endpoint: Url,
    decimals: u32,
}

impl NmtLookup {
    /// `decimals` must match the key precision the enrichment client uses.
    pub fn new(endpoint: &str, decimals: u32) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("invalid elevation endpoint {endpoint:?}: {e}"))?;
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint,
            decimals,
        })
    }

    fn url(&self, keys: &[CoordKey]) -> Url {
        let list = keys
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("request", "GetHByPointList")
            .append_pair("list", &list);
        url
    }
}

impl ElevationLookup for NmtLookup {
    fn lookup(&self, keys: &[CoordKey]) -> Result<HashMap<CoordKey, f64>, LookupError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.url(keys);
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| LookupError::Transient(format!("request failed: {e}")))?;
        let status = resp.status().as_u16();

        // Retryable: 429, 5xx
        if status == 429 || status >= 500 {
            return Err(LookupError::Transient(format!("NMT upstream error ({status})")));
        }
        // Other 4xx: fail immediately
        if status >= 400 {
            return Err(LookupError::Config(format!("NMT request rejected ({status})")));
        }
        let body = resp
            .text()
            .map_err(|e| LookupError::Transient(format!("reading body: {e}")))?;
        debug!(keys = keys.len(), bytes = body.len(), "NMT response");
        Ok(parse_response(&body, self.decimals))
    }
}

/// Parse `"<n> <e> <h>,<n> <e> <h>,..."`. Entries that are not a triple of
/// numbers are skipped, so their keys read as absent.
pub fn parse_response(body: &str, decimals: u32) -> HashMap<CoordKey, f64> {
    let mut out = HashMap::new();
    for entry in body.trim().split(',') {
        let mut parts = entry.split_whitespace();
        let (Some(n), Some(e), Some(h), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let (Ok(n), Ok(e), Ok(h)) = (n.parse::<f64>(), e.parse::<f64>(), h.parse::<f64>()) else {
            continue;
        };
        if !(n.is_finite() && e.is_finite() && h.is_finite()) {
            continue;
        }
        out.insert(CoordKey::from_parts(n, e, decimals), h);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn keys() -> Vec<CoordKey> {
        vec![
            CoordKey::from_parts(376_543.21, 605_912.34, 2),
            CoordKey::from_parts(376_600.00, 606_000.00, 2),
        ]
    }

    #[test]
    fn parses_triples_and_skips_garbage() {
        let body = "376543.21 605912.34 182.4,376600.00 606000.00 abc, ,1 2";
        let got = parse_response(body, 2);
        assert_eq!(got.len(), 1);
        assert_eq!(got[&keys()[0]], 182.4);
    }

    #[test]
    fn sends_northing_first_list() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/nmt/")
                .query_param("request", "GetHByPointList")
                .query_param("list", "376543.21 605912.34,376600.00 606000.00");
            then.status(200)
                .body("376543.21 605912.34 182.40,376600.00 606000.00 183.10");
        });

        let client = NmtLookup::new(&server.url("/nmt/"), 2).unwrap();
        let got = client.lookup(&keys()).unwrap();

        mock.assert();
        assert_eq!(got.len(), 2);
        assert_eq!(got[&keys()[1]], 183.1);
    }

    #[test]
    fn server_errors_are_transient() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/nmt/");
            then.status(503);
        });

        let client = NmtLookup::new(&server.url("/nmt/"), 2).unwrap();
        let err = client.lookup(&keys()).unwrap_err();

        mock.assert();
        assert!(matches!(err, LookupError::Transient(_)));
    }

    #[test]
    fn client_errors_are_configuration() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/nmt/");
            then.status(404);
        });

        let client = NmtLookup::new(&server.url("/nmt/"), 2).unwrap();
        let err = client.lookup(&keys()).unwrap_err();
        assert!(matches!(err, LookupError::Config(_)));
    }

    #[test]
    fn malformed_endpoint_is_rejected_up_front() {
        assert!(NmtLookup::new("not a url", 2).is_err());
    }

    #[test]
    fn retried_through_enrichment_client() {
        use diffh::api::{EnrichCfg, EnrichmentClient, Origin, Point, Zone, AxisConvention};
        use diffh::Vec2;

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/nmt/");
            then.status(500);
        });
        let lookup = NmtLookup::new(&server.url("/nmt/"), 2).unwrap();
        let cfg = EnrichCfg {
            retry_max_attempts: 3,
            retry_backoff_ms: 0,
            ..EnrichCfg::default()
        };
        let point = Point {
            id: "1".into(),
            x_raw: 5_679_143.50,
            y_raw: 7_466_893.08,
            axis: AxisConvention::NorthingFirst,
            zone: Zone::Z7,
            canon: Some(Vec2::new(605_912.34, 376_543.21)),
            h: Some(182.0),
            origin: Origin::Input,
        };
        let report = EnrichmentClient::new(&lookup, cfg)
            .unwrap()
            .enrich(&[point])
            .unwrap();

        mock.assert_hits(3);
        assert_eq!(report.heights, vec![None]);
        assert_eq!(report.failed_batches, 1);
    }
}
