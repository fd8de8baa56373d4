use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::ScrapeError;
use crate::models::ResolvedLocation;
use crate::transport::Transport;

const TYPEAHEAD_URL: &str = "https://www.linkedin.com/jobs-guest/api/typeaheadHits";
const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// One autocomplete hit, in the service's relevance order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLocation {
    pub display: String,
    pub geo_id: String,
}

/// Maps free-text location strings to canonical geo identifiers via the
/// public autocomplete endpoint. Lookups never block past the deadline.
pub struct LocationResolver {
    transport: Arc<dyn Transport>,
    deadline: Duration,
}

impl LocationResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, deadline: DEFAULT_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Candidates ranked by the remote service. Empty input short-circuits to
    /// `UnresolvableLocation` without a network call.
    pub async fn resolve(&self, text: &str) -> Result<Vec<CandidateLocation>, ScrapeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScrapeError::UnresolvableLocation(String::new()));
        }

        let params = vec![
            ("typeaheadType".to_string(), "GEO".to_string()),
            ("query".to_string(), text.to_string()),
        ];
        let resp = tokio::time::timeout(self.deadline, self.transport.fetch(TYPEAHEAD_URL, &params))
            .await
            .map_err(|_| ScrapeError::ResolutionTimeout {
                text: text.to_string(),
                deadline: self.deadline,
            })??;

        Ok(parse_candidates(&resp.body))
    }

    /// Disambiguation policy: an exact (case-insensitive, trimmed) display
    /// match wins outright; otherwise take the top-ranked candidate and set
    /// the ambiguity flag so downstream auditing can surface it.
    pub async fn select(&self, text: &str) -> Result<ResolvedLocation, ScrapeError> {
        let candidates = self.resolve(text).await?;
        let Some(top) = candidates.first() else {
            return Err(ScrapeError::UnresolvableLocation(text.to_string()));
        };

        let wanted = text.trim().to_lowercase();
        let exact = candidates
            .iter()
            .find(|c| c.display.trim().to_lowercase() == wanted);

        let (chosen, ambiguous) = match exact {
            Some(c) => (c, false),
            None => (top, true),
        };

        Ok(ResolvedLocation {
            text: text.trim().to_string(),
            geo_id: chosen.geo_id.clone(),
            display: chosen.display.clone(),
            ambiguous,
        })
    }
}

/// Tolerant pick-apart of the typeahead JSON: hits live under "elements",
/// display text under "text"/"displayName", and the geo id either as a bare
/// "id" or as the trailing digits of an entity URN.
fn parse_candidates(body: &str) -> Vec<CandidateLocation> {
    let Ok(root) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let Some(elements) = root.get("elements").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for el in elements {
        let display = el
            .get("text")
            .and_then(|t| t.as_str().or_else(|| t.get("text").and_then(Value::as_str)))
            .or_else(|| el.get("displayName").and_then(Value::as_str));
        let geo_id = el
            .get("id")
            .and_then(value_as_id)
            .or_else(|| el.get("targetUrn").and_then(Value::as_str).and_then(urn_digits))
            .or_else(|| el.get("entityUrn").and_then(Value::as_str).and_then(urn_digits));
        if let (Some(display), Some(geo_id)) = (display, geo_id) {
            out.push(CandidateLocation { display: display.to_string(), geo_id });
        }
    }
    out
}

fn value_as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => urn_digits(s).or_else(|| Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn urn_digits(urn: &str) -> Option<String> {
    let digits: String = urn
        .rsplit(':')
        .next()
        .unwrap_or(urn)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() { None } else { Some(digits) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;

    fn typeahead_body(hits: &[(&str, &str)]) -> String {
        let elements: Vec<Value> = hits
            .iter()
            .map(|(text, id)| serde_json::json!({"text": text, "id": id}))
            .collect();
        serde_json::json!({ "elements": elements }).to_string()
    }

    fn resolver_with_body(body: String) -> LocationResolver {
        let transport = Arc::new(MockTransport::new(move |_, _| MockTransport::ok(&body)));
        LocationResolver::new(transport)
    }

    #[tokio::test]
    async fn exact_display_match_is_unambiguous() {
        let body = typeahead_body(&[("Greenwood Village, CO", "urn:li:geo:104949271")]);
        let resolver = resolver_with_body(body);
        let loc = resolver.select("Greenwood Village, CO").await.unwrap();
        assert_eq!(loc.geo_id, "104949271");
        assert!(!loc.ambiguous);
    }

    #[tokio::test]
    async fn fuzzy_input_picks_top_hit_and_flags_ambiguity() {
        let body = typeahead_body(&[
            ("United Kingdom", "101165590"),
            ("Ukraine", "102264497"),
        ]);
        let resolver = resolver_with_body(body);
        let loc = resolver.select("UK").await.unwrap();
        assert_eq!(loc.geo_id, "101165590");
        assert!(loc.ambiguous);
    }

    #[tokio::test]
    async fn zero_candidates_is_unresolvable() {
        let resolver = resolver_with_body(typeahead_body(&[]));
        let err = resolver.select("Atlantis").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnresolvableLocation(_)));
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let transport = Arc::new(
            MockTransport::new(|_, _| MockTransport::ok("{}"))
                .with_delay(Duration::from_millis(200)),
        );
        let resolver =
            LocationResolver::new(transport).with_deadline(Duration::from_millis(20));
        let err = resolver.resolve("Berlin").await.unwrap_err();
        assert!(matches!(err, ScrapeError::ResolutionTimeout { .. }));
    }

    #[test]
    fn candidates_parse_from_urn_shapes() {
        let body = serde_json::json!({
            "elements": [
                {"displayName": "Berlin, Germany", "entityUrn": "urn:li:fs_geo:103035651"},
                {"text": {"text": "Berlin, CT"}, "targetUrn": "urn:li:geo:104623591"},
                {"text": "No id here"}
            ]
        })
        .to_string();
        let candidates = parse_candidates(&body);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].geo_id, "103035651");
        assert_eq!(candidates[1].display, "Berlin, CT");
    }

    #[test]
    fn garbage_body_yields_no_candidates() {
        assert!(parse_candidates("<html>not json</html>").is_empty());
    }
}
