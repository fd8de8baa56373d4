use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::ScrapeError;
use crate::models::{
    ApplyMethod, CompanyRecord, EmploymentType, JobLocation, JobRecord, ParsedLocation,
    RawFragment, Salary, WorkplaceType,
};

pub const JOB_VIEW_BASE: &str = "https://www.linkedin.com/jobs/view/";

/// Full page size on the public search endpoint. A page with fewer parsed
/// listings is the end-of-results signal.
pub const PAGE_SIZE: usize = 25;

/// One listing lifted off a list page: just enough to schedule the detail
/// fetch, plus the unparsed snippet for the extraction pass.
#[derive(Debug, Clone)]
pub struct ListingSnippet {
    pub id: String,
    pub url: String,
    /// Canonical JSON text of the snippet.
    pub summary: String,
}

/// Pulls JobPosting snippets out of a search-results page. Primary source is
/// the embedded JSON-LD blocks; anchors pointing at listing pages are the
/// fallback when no structured data is present.
pub fn parse_list_page(html: &str) -> Vec<ListingSnippet> {
    let document = Html::parse_document(html);

    let mut snippets = Vec::new();
    for data in ld_json_blocks(&document) {
        collect_job_postings(&data, &mut snippets);
    }

    if snippets.is_empty() {
        let anchor_sel = Selector::parse("a[href]").unwrap();
        for anchor in document.select(&anchor_sel) {
            let Some(href) = anchor.value().attr("href") else { continue };
            if !href.contains("/jobs/view/") {
                continue;
            }
            let Some(id) = job_id_from_url(href) else { continue };
            let title = element_text(&anchor);
            if title.is_empty() {
                continue;
            }
            let url = normalize_job_url(href);
            let synthesized = serde_json::json!({
                "@type": "JobPosting",
                "title": title,
                "url": url,
                "identifier": { "value": id },
            });
            snippets.push(ListingSnippet { id, url, summary: synthesized.to_string() });
        }
    }

    // One snippet per id, first occurrence wins.
    let mut seen = BTreeSet::new();
    snippets.retain(|s| seen.insert(s.id.clone()));
    snippets
}

fn collect_job_postings(data: &Value, out: &mut Vec<ListingSnippet>) {
    match data {
        Value::Array(items) => {
            for item in items {
                collect_job_postings(item, out);
            }
        }
        Value::Object(map) => {
            if map.get("@type").and_then(Value::as_str) == Some("JobPosting") {
                if let Some(snippet) = snippet_from_posting(data) {
                    out.push(snippet);
                }
            } else if let Some(graph) = map.get("@graph") {
                collect_job_postings(graph, out);
            }
        }
        _ => {}
    }
}

fn snippet_from_posting(posting: &Value) -> Option<ListingSnippet> {
    let url = posting
        .get("url")
        .and_then(Value::as_str)
        .map(normalize_job_url);
    let id = posting
        .get("identifier")
        .and_then(|ident| {
            ident
                .get("value")
                .or_else(|| ident.get("@id"))
                .and_then(json_to_string)
        })
        .or_else(|| url.as_deref().and_then(job_id_from_url))?;
    let url = url.unwrap_or_else(|| format!("{JOB_VIEW_BASE}{id}/"));
    Some(ListingSnippet { id, url, summary: posting.to_string() })
}

fn json_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn job_id_from_url(url: &str) -> Option<String> {
    static VIEW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/view/(\d+)").unwrap());
    static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{6,})").unwrap());
    VIEW_RE
        .captures(url)
        .or_else(|| DIGITS_RE.captures(url))
        .map(|c| c[1].to_string())
}

pub fn normalize_job_url(url: &str) -> String {
    if url.starts_with("http") {
        // Strip tracking query parameters so the URL is stable across runs.
        url.split('?').next().unwrap_or(url).to_string()
    } else if let Some(path) = url.strip_prefix('/') {
        format!("https://www.linkedin.com/{}", path.split('?').next().unwrap_or(path))
    } else {
        format!("{JOB_VIEW_BASE}{url}/")
    }
}

/// Parses a fragment into the canonical record. Summary fields come from the
/// list-page snippet, detail fields from the detail document; detail wins
/// where both speak. Pure and synchronous: the same fragment always yields
/// the same record.
pub fn extract(fragment: &RawFragment) -> Result<JobRecord, ScrapeError> {
    let summary: Value = serde_json::from_str(&fragment.summary)
        .map_err(|e| ScrapeError::malformed(&fragment.job_id, format!("summary not JSON: {e}")))?;

    let id = if fragment.job_id.is_empty() {
        summary
            .get("identifier")
            .and_then(|i| i.get("value"))
            .and_then(json_to_string)
            .ok_or_else(|| ScrapeError::malformed("", "listing has no id"))?
    } else {
        fragment.job_id.clone()
    };
    let title = summary
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScrapeError::malformed(&id, "listing has no title"))?
        .to_string();

    let url = summary
        .get("url")
        .and_then(Value::as_str)
        .map(normalize_job_url)
        .unwrap_or_else(|| {
            if fragment.url.is_empty() {
                format!("{JOB_VIEW_BASE}{id}/")
            } else {
                fragment.url.clone()
            }
        });

    let posted_date = summary
        .get("datePosted")
        .and_then(Value::as_str)
        .and_then(parse_datetime);
    let expire_at = summary
        .get("validThrough")
        .and_then(Value::as_str)
        .and_then(parse_datetime);

    let employment_type = summary
        .get("employmentType")
        .and_then(Value::as_str)
        .and_then(EmploymentType::from_source);
    let workplace_type = summary
        .get("jobLocationType")
        .and_then(Value::as_str)
        .and_then(WorkplaceType::from_source);

    let description_html = summary
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    let description_text = description_html.as_deref().map(html_to_text);

    let location_text = summary_location_text(&summary);
    let salary = summary_salary(&summary);

    let mut company = CompanyRecord::default();
    if let Some(org) = summary.get("hiringOrganization") {
        company.name = org.get("name").and_then(Value::as_str).map(str::to_string);
        company.linkedin_url = org.get("sameAs").and_then(Value::as_str).map(str::to_string);
        company.logo_url = org
            .get("logo")
            .and_then(|l| l.as_str().or_else(|| l.get("url").and_then(Value::as_str)))
            .map(str::to_string);
    }

    let mut record = JobRecord {
        id,
        title,
        url,
        job_state: "LISTED".to_string(),
        posted_date,
        description_text,
        description_html,
        location: JobLocation {
            parsed: location_text.as_deref().and_then(parse_location_text),
            text: location_text,
        },
        employment_type,
        workplace_type,
        salary,
        company,
        benefits: Vec::new(),
        applicants: None,
        views: None,
        apply_method: None,
        job_functions: Vec::new(),
        expire_at,
        missing_fields: Vec::new(),
    };

    if let Some(detail_html) = &fragment.detail {
        merge_detail(&mut record, detail_html);
    }

    record.missing_fields = missing_fields(&record);
    Ok(record)
}

fn summary_location_text(summary: &Value) -> Option<String> {
    let loc = summary.get("jobLocation")?;
    let first = match loc {
        Value::Array(items) => items.first()?,
        other => other,
    };
    first
        .get("address")
        .and_then(|a| a.get("addressLocality"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn summary_salary(summary: &Value) -> Salary {
    let mut salary = Salary::default();
    let Some(base) = summary.get("baseSalary") else {
        return salary;
    };
    let value = base.get("value").cloned().unwrap_or(Value::Null);
    salary.min = value.get("minValue").and_then(Value::as_f64);
    salary.max = value.get("maxValue").and_then(Value::as_f64);
    salary.currency = base
        .get("currency")
        .and_then(Value::as_str)
        .map(str::to_string);
    if salary.min.is_some() || salary.max.is_some() {
        let mut bounds: Vec<String> = Vec::new();
        if let Some(min) = salary.min {
            bounds.push(format!("{min:.0}"));
        }
        if let Some(max) = salary.max {
            bounds.push(format!("{max:.0}"));
        }
        let mut text = bounds.join(" - ");
        if let Some(cur) = &salary.currency {
            text.push(' ');
            text.push_str(cur);
        }
        salary.text = Some(text);
    }
    salary
}

/// Everything the detail document can contribute on top of the snippet.
fn merge_detail(record: &mut JobRecord, html: &str) {
    let document = Html::parse_document(html);

    // The detail page usually carries its own, fuller JSON-LD block.
    for data in ld_json_blocks(&document) {
        let posting = match &data {
            Value::Array(items) => items
                .iter()
                .find(|i| i.get("@type").and_then(Value::as_str) == Some("JobPosting")),
            v if v.get("@type").and_then(Value::as_str) == Some("JobPosting") => Some(&data),
            _ => None,
        };
        let Some(posting) = posting else { continue };
        if let Some(desc) = posting.get("description").and_then(Value::as_str) {
            record.description_html = Some(desc.to_string());
            record.description_text = Some(html_to_text(desc));
        }
        if record.posted_date.is_none() {
            record.posted_date = posting
                .get("datePosted")
                .and_then(Value::as_str)
                .and_then(parse_datetime);
        }
        if record.expire_at.is_none() {
            record.expire_at = posting
                .get("validThrough")
                .and_then(Value::as_str)
                .and_then(parse_datetime);
        }
        if record.employment_type.is_none() {
            record.employment_type = posting
                .get("employmentType")
                .and_then(Value::as_str)
                .and_then(EmploymentType::from_source);
        }
        if record.salary.is_empty() {
            record.salary = summary_salary(posting);
        }
        break;
    }

    if record.description_html.is_none() {
        let desc_sel = Selector::parse(
            "div.show-more-less-html__markup, div.description__text, #job-details",
        )
        .unwrap();
        if let Some(div) = document.select(&desc_sel).next() {
            record.description_html = Some(div.inner_html());
            record.description_text = Some(element_text(&div));
        }
    }

    // Applicants and views surface in loose spans; digits only, best effort.
    let span_sel = Selector::parse("span, figcaption").unwrap();
    for span in document.select(&span_sel) {
        let text = element_text(&span);
        let lower = text.to_lowercase();
        if record.applicants.is_none() && lower.contains("applicant") {
            record.applicants = leading_number(&text);
        }
        if record.views.is_none() && lower.contains("view") && !lower.contains("review") {
            record.views = leading_number(&text);
        }
    }

    let li_sel = Selector::parse("li").unwrap();
    for li in document.select(&li_sel) {
        let text = element_text(&li);
        if text.is_empty() {
            continue;
        }
        let lower = text.to_lowercase();
        if lower.contains("benefit") && !record.benefits.contains(&text) {
            record.benefits.push(text.clone());
        }
        if lower.contains("function") && !record.job_functions.contains(&text) {
            record.job_functions.push(text);
        }
    }

    let anchor_sel = Selector::parse("a[href]").unwrap();
    if record.apply_method.is_none() {
        for anchor in document.select(&anchor_sel) {
            let label = element_text(&anchor);
            if label.to_lowercase().contains("apply") {
                record.apply_method = Some(ApplyMethod {
                    url: anchor.value().attr("href").map(str::to_string),
                    label: Some(label),
                });
                break;
            }
        }
    }

    // Salary callout, when the structured block said nothing.
    if record.salary.is_empty() {
        let salary_sel =
            Selector::parse("div.salary, span.salary, div.compensation__salary").unwrap();
        if let Some(el) = document.select(&salary_sel).next() {
            let text = element_text(&el);
            if !text.is_empty() {
                record.salary = parse_salary_text(&text);
            }
        }
    }

    merge_company(&mut record.company, &document);
}

/// Company facts scattered around the detail document: profile link, employee
/// count copy, headquarters label, logo, industry links.
fn merge_company(company: &mut CompanyRecord, document: &Html) {
    let anchor_sel = Selector::parse("a[href]").unwrap();
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else { continue };
        if !href.contains("/company/") {
            continue;
        }
        if company.linkedin_url.is_none() {
            company.linkedin_url = Some(if href.starts_with("http") {
                href.split('?').next().unwrap_or(href).to_string()
            } else {
                format!("https://www.linkedin.com{}", href.split('?').next().unwrap_or(href))
            });
        }
        if company.name.is_none() {
            let text = element_text(&anchor);
            if !text.is_empty() {
                company.name = Some(text);
            }
        }
        break;
    }

    let text_sel = Selector::parse("span, dd, div, p").unwrap();
    for el in document.select(&text_sel) {
        if el.children().any(|c| c.value().is_element()) {
            continue; // leaf nodes only, to keep the clue text tight
        }
        let text = element_text(&el);
        let lower = text.to_lowercase();
        if company.employee_count.is_none() && lower.contains("employees") {
            company.employee_count = parse_employee_count(&text);
        }
        if company.headquarters.is_none() && lower.contains("headquarters") {
            let cleaned = text
                .replace("Headquarters:", "")
                .replace("Headquarters", "")
                .trim()
                .to_string();
            if !cleaned.is_empty() {
                company.headquarters = Some(cleaned);
            }
        }
        if lower.contains("industry") {
            // The industry value typically trails the label.
            if let Some(value) = text.splitn(2, ':').nth(1) {
                let value = value.trim().to_string();
                if !value.is_empty() && !company.industries.contains(&value) {
                    company.industries.push(value);
                }
            }
        }
    }

    if company.logo_url.is_none() {
        if let Some(name) = company.name.clone() {
            let img_sel = Selector::parse("img[alt]").unwrap();
            for img in document.select(&img_sel) {
                let alt = img.value().attr("alt").unwrap_or("");
                if alt.to_lowercase().contains(&name.to_lowercase()) {
                    company.logo_url = img.value().attr("src").map(str::to_string);
                    break;
                }
            }
        }
    }
}

/// "11-50 employees" or "10,483 employees" -> the largest numeric chunk.
fn parse_employee_count(text: &str) -> Option<u32> {
    static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());
    NUM_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<u32>().ok())
        .max()
}

fn leading_number(text: &str) -> Option<u32> {
    static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());
    NUM_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok())
}

static SALARY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<cur1>[$€£])?\s*
        (?P<min>\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(?P<k1>[kK])?
        \s*(?:-|–|—|\bto\b)\s*
        (?:[$€£])?\s*
        (?P<max>\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(?P<k2>[kK])?
        (?:\s*/?\s*[a-z]*\s*(?P<cur2>[A-Z]{3}))?
        ",
    )
    .unwrap()
});

/// Normalizes free-text salary ranges into numeric bounds plus currency.
/// Text that doesn't follow a recognizable numeric-range pattern is kept
/// verbatim with the numeric fields absent.
pub fn parse_salary_text(text: &str) -> Salary {
    let text = text.trim();
    if text.is_empty() {
        return Salary::default();
    }

    let mut salary = Salary { text: Some(text.to_string()), ..Default::default() };
    let Some(caps) = SALARY_RANGE_RE.captures(text) else {
        return salary;
    };

    let parse_bound = |name: &str, k: &str| -> Option<f64> {
        let raw = caps.name(name)?.as_str().replace(',', "");
        let mut n: f64 = raw.parse().ok()?;
        if caps.name(k).is_some() {
            n *= 1000.0;
        }
        Some(n)
    };
    let mut min = parse_bound("min", "k1");
    let mut max = parse_bound("max", "k2");
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            (min, max) = (Some(hi), Some(lo));
        }
    }
    salary.min = min;
    salary.max = max;
    salary.currency = caps
        .name("cur2")
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            caps.name("cur1").map(|m| match m.as_str() {
                "$" => "USD".to_string(),
                "€" => "EUR".to_string(),
                "£" => "GBP".to_string(),
                other => other.to_string(),
            })
        });
    salary
}

/// Heuristic comma split: 1 part is a bare city (or "remote", which names no
/// place), 2 parts are city and state, 3 or more are city, state, country.
pub fn parse_location_text(text: &str) -> Option<ParsedLocation> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut parsed = ParsedLocation { text: text.to_string(), ..Default::default() };
    let parts: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    match parts.len() {
        0 => return None,
        1 => {
            if !text.eq_ignore_ascii_case("remote") {
                parsed.city = Some(parts[0].to_string());
            }
        }
        2 => {
            parsed.city = Some(parts[0].to_string());
            parsed.state = Some(parts[1].to_string());
        }
        _ => {
            parsed.city = Some(parts[0].to_string());
            parsed.state = Some(parts[1].to_string());
            parsed.country = Some(parts[parts.len() - 1].to_string());
        }
    }
    Some(parsed)
}

pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn ld_json_blocks(document: &Html) -> Vec<Value> {
    // Structured data appears in ld+json script tags or, on some renderings,
    // inside bare <code> blocks. Anything that isn't JSON falls out here.
    let sel = Selector::parse(r#"script[type="application/ld+json"], code"#).unwrap();
    document
        .select(&sel)
        .filter_map(|el| {
            let raw = el.text().collect::<String>();
            serde_json::from_str::<Value>(&raw).ok()
        })
        .collect()
}

fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// The explicit absence set. Computed from the finished record, so a field
/// is listed here exactly when it is absent. List fields count as absent
/// when empty, since the source never distinguishes "none listed" from
/// "section not present".
fn missing_fields(record: &JobRecord) -> Vec<String> {
    let mut missing = BTreeSet::new();
    if record.posted_date.is_none() {
        missing.insert("postedDate");
    }
    if record.description_text.is_none() {
        missing.insert("descriptionText");
    }
    if record.description_html.is_none() {
        missing.insert("descriptionHtml");
    }
    if record.location.text.is_none() {
        missing.insert("location.text");
    }
    if record.location.parsed.is_none() {
        missing.insert("location.parsed");
    }
    if record.employment_type.is_none() {
        missing.insert("employmentType");
    }
    if record.workplace_type.is_none() {
        missing.insert("workplaceType");
    }
    if record.salary.is_empty() {
        missing.insert("salary");
    }
    if record.benefits.is_empty() {
        missing.insert("benefits");
    }
    if record.job_functions.is_empty() {
        missing.insert("jobFunctions");
    }
    if record.company.name.is_none() {
        missing.insert("company.name");
    }
    if record.applicants.is_none() {
        missing.insert("applicants");
    }
    if record.views.is_none() {
        missing.insert("views");
    }
    if record.apply_method.is_none() {
        missing.insert("applyMethod");
    }
    if record.expire_at.is_none() {
        missing.insert("expireAt");
    }
    missing.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting_json() -> Value {
        serde_json::json!({
            "@type": "JobPosting",
            "title": "Platform Engineer",
            "url": "https://www.linkedin.com/jobs/view/3912345678/?refId=track",
            "identifier": { "value": "3912345678" },
            "datePosted": "2026-08-01T09:30:00Z",
            "validThrough": "2026-09-30",
            "employmentType": "FULL_TIME",
            "description": "<p>Build <b>things</b>.</p>",
            "hiringOrganization": { "name": "Acme Corp", "sameAs": "https://www.linkedin.com/company/acme" },
            "jobLocation": { "address": { "addressLocality": "Greenwood Village, CO" } },
            "baseSalary": { "currency": "USD", "value": { "minValue": 120000, "maxValue": 150000 } }
        })
    }

    fn list_page_html(postings: &[Value]) -> String {
        let blocks: Vec<String> = postings
            .iter()
            .map(|p| format!(r#"<script type="application/ld+json">{p}</script>"#))
            .collect();
        format!("<html><body>{}</body></html>", blocks.join(""))
    }

    fn detail_html() -> String {
        r#"<html><body>
            <a href="/company/acme?trk=nav">Acme Corp</a>
            <span>1,001-5,000 employees</span>
            <span>27 applicants</span>
            <span>412 views</span>
            <div>Headquarters: Denver, CO</div>
            <p>Industry: Software Development</p>
            <div class="show-more-less-html__markup"><p>Full description here.</p></div>
            <ul><li>Medical benefits included</li><li>Job function: Engineering</li></ul>
            <a href="https://example.com/apply?src=x">Apply now</a>
            <img alt="Acme Corp logo" src="https://cdn.example.com/acme.png"/>
        </body></html>"#
            .to_string()
    }

    fn fragment() -> RawFragment {
        RawFragment {
            job_id: "3912345678".into(),
            url: "https://www.linkedin.com/jobs/view/3912345678/".into(),
            summary: posting_json().to_string(),
            detail: Some(detail_html()),
        }
    }

    fn assert_missing_consistent(record: &JobRecord) {
        let recomputed = missing_fields(record);
        assert_eq!(record.missing_fields, recomputed);
    }

    #[test]
    fn list_page_yields_snippets_from_json_ld() {
        let html = list_page_html(&[posting_json()]);
        let snippets = parse_list_page(&html);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, "3912345678");
        assert_eq!(snippets[0].url, "https://www.linkedin.com/jobs/view/3912345678/");
    }

    #[test]
    fn list_page_falls_back_to_anchors() {
        let html = r#"<html><body>
            <a href="/jobs/view/1234567890/?trk=x">Data Engineer</a>
            <a href="/jobs/search?keywords=x">See all</a>
        </body></html>"#;
        let snippets = parse_list_page(html);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, "1234567890");
        let summary: Value = serde_json::from_str(&snippets[0].summary).unwrap();
        assert_eq!(summary["title"], "Data Engineer");
    }

    #[test]
    fn duplicate_ids_collapse_on_a_page() {
        let html = list_page_html(&[posting_json(), posting_json()]);
        assert_eq!(parse_list_page(&html).len(), 1);
    }

    #[test]
    fn extract_merges_summary_and_detail() {
        let record = extract(&fragment()).unwrap();
        assert_eq!(record.id, "3912345678");
        assert_eq!(record.title, "Platform Engineer");
        assert_eq!(record.job_state, "LISTED");
        assert_eq!(record.employment_type, Some(EmploymentType::FullTime));
        assert_eq!(record.salary.min, Some(120000.0));
        assert_eq!(record.salary.max, Some(150000.0));
        assert_eq!(record.salary.currency.as_deref(), Some("USD"));
        assert_eq!(record.applicants, Some(27));
        assert_eq!(record.views, Some(412));
        assert_eq!(record.company.name.as_deref(), Some("Acme Corp"));
        assert_eq!(record.company.employee_count, Some(5000));
        assert_eq!(record.company.headquarters.as_deref(), Some("Denver, CO"));
        assert_eq!(record.company.industries, vec!["Software Development"]);
        assert_eq!(
            record.company.logo_url.as_deref(),
            Some("https://cdn.example.com/acme.png")
        );
        assert_eq!(record.benefits, vec!["Medical benefits included"]);
        assert_eq!(record.apply_method.as_ref().unwrap().label.as_deref(), Some("Apply now"));
        let parsed = record.location.parsed.as_ref().unwrap();
        assert_eq!(parsed.city.as_deref(), Some("Greenwood Village"));
        assert_eq!(parsed.state.as_deref(), Some("CO"));
        assert!(record.posted_date.is_some());
        assert!(record.expire_at.is_some());
        assert_missing_consistent(&record);
    }

    #[test]
    fn summary_only_fragment_is_partial_not_dropped() {
        let mut frag = fragment();
        frag.detail = None;
        let record = extract(&frag).unwrap();
        assert!(record.is_partial());
        assert!(record.missing_fields.contains(&"applicants".to_string()));
        assert!(record.missing_fields.contains(&"applyMethod".to_string()));
        // Empty list fields read as absent, so a summary-only record flags
        // them rather than passing off empty vectors as parsed data.
        assert!(record.missing_fields.contains(&"benefits".to_string()));
        assert!(record.missing_fields.contains(&"jobFunctions".to_string()));
        assert!(!record.missing_fields.contains(&"salary".to_string()));
        assert_missing_consistent(&record);
    }

    #[test]
    fn missing_title_is_malformed() {
        let mut posting = posting_json();
        posting.as_object_mut().unwrap().remove("title");
        let frag = RawFragment {
            job_id: "3912345678".into(),
            url: String::new(),
            summary: posting.to_string(),
            detail: None,
        };
        let err = extract(&frag).unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedListing { .. }));
    }

    #[test]
    fn missing_id_is_malformed() {
        let mut posting = posting_json();
        posting.as_object_mut().unwrap().remove("identifier");
        posting.as_object_mut().unwrap().remove("url");
        let frag = RawFragment {
            job_id: String::new(),
            url: String::new(),
            summary: posting.to_string(),
            detail: None,
        };
        assert!(extract(&frag).is_err());
    }

    #[test]
    fn extraction_is_idempotent() {
        let frag = fragment();
        let first = extract(&frag).unwrap();
        let second = extract(&frag).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn salary_range_with_currency_code() {
        let salary = parse_salary_text("80,000 - 85,000 USD");
        assert_eq!(salary.min, Some(80000.0));
        assert_eq!(salary.max, Some(85000.0));
        assert_eq!(salary.currency.as_deref(), Some("USD"));
        assert_eq!(salary.text.as_deref(), Some("80,000 - 85,000 USD"));
    }

    #[test]
    fn unparseable_salary_keeps_text_only() {
        let salary = parse_salary_text("Competitive");
        assert_eq!(salary.text.as_deref(), Some("Competitive"));
        assert_eq!(salary.min, None);
        assert_eq!(salary.max, None);
        assert_eq!(salary.currency, None);
    }

    #[test]
    fn salary_symbols_and_k_suffixes() {
        let salary = parse_salary_text("$150k - $200k per year");
        assert_eq!(salary.min, Some(150000.0));
        assert_eq!(salary.max, Some(200000.0));
        assert_eq!(salary.currency.as_deref(), Some("USD"));

        let swapped = parse_salary_text("£90,000 to £70,000");
        assert_eq!(swapped.min, Some(70000.0));
        assert_eq!(swapped.max, Some(90000.0));
        assert_eq!(swapped.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn location_split_variants() {
        let two = parse_location_text("Greenwood Village, CO").unwrap();
        assert_eq!(two.city.as_deref(), Some("Greenwood Village"));
        assert_eq!(two.state.as_deref(), Some("CO"));
        assert_eq!(two.country, None);

        let three = parse_location_text("London, England, United Kingdom").unwrap();
        assert_eq!(three.city.as_deref(), Some("London"));
        assert_eq!(three.state.as_deref(), Some("England"));
        assert_eq!(three.country.as_deref(), Some("United Kingdom"));

        let remote = parse_location_text("Remote").unwrap();
        assert_eq!(remote.city, None);
        assert_eq!(remote.text, "Remote");

        assert!(parse_location_text("  ").is_none());
    }

    #[test]
    fn job_urls_normalize_and_carry_ids() {
        assert_eq!(job_id_from_url("/jobs/view/1234567890/"), Some("1234567890".into()));
        assert_eq!(job_id_from_url("no digits"), None);
        assert_eq!(
            normalize_job_url("https://www.linkedin.com/jobs/view/42/?trk=abc"),
            "https://www.linkedin.com/jobs/view/42/"
        );
        assert_eq!(normalize_job_url("99"), format!("{JOB_VIEW_BASE}99/"));
    }
}
