use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scraping run's input. Immutable once planning begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub max_items_per_query: Option<usize>,
    /// Pagination depth per search unit. Clamped to 40, the site's practical limit.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub employment_type: Vec<EmploymentType>,
    pub workplace_type: Vec<WorkplaceType>,
    pub experience_level: Vec<ExperienceLevel>,
    /// Minimum annual salary in the site's base currency. Mapped to a bucket code.
    pub salary_floor: Option<u32>,
    pub posted_within: Option<PostedWithin>,
    pub easy_apply_only: bool,
    pub under_ten_applicants: bool,
    pub industry_ids: Vec<u32>,
}

impl SearchFilters {
    /// Query parameters understood by the public search endpoint.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.employment_type.is_empty() {
            let codes: Vec<&str> = self.employment_type.iter().map(|t| t.code()).collect();
            params.push(("f_JT".to_string(), codes.join(",")));
        }
        if !self.workplace_type.is_empty() {
            let codes: Vec<String> =
                self.workplace_type.iter().map(|t| t.code().to_string()).collect();
            params.push(("f_WT".to_string(), codes.join(",")));
        }
        if !self.experience_level.is_empty() {
            let codes: Vec<String> =
                self.experience_level.iter().map(|l| (*l as u8).to_string()).collect();
            params.push(("f_E".to_string(), codes.join(",")));
        }
        if let Some(floor) = self.salary_floor {
            params.push(("f_SB2".to_string(), salary_bucket(floor).to_string()));
        }
        if let Some(window) = self.posted_within {
            params.push(("f_TPR".to_string(), window.code().to_string()));
        }
        if self.easy_apply_only {
            params.push(("f_AL".to_string(), "true".to_string()));
        }
        if self.under_ten_applicants {
            params.push(("f_UD".to_string(), "1".to_string()));
        }
        if !self.industry_ids.is_empty() {
            let ids: Vec<String> = self.industry_ids.iter().map(|i| i.to_string()).collect();
            params.push(("f_I".to_string(), ids.join(",")));
        }
        params
    }
}

/// Salary buckets run 40k..200k in 20k steps, codes 1..=9.
fn salary_bucket(floor: u32) -> u32 {
    (floor / 20_000).saturating_sub(1).clamp(1, 9)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Volunteer,
    Other,
}

impl EmploymentType {
    pub fn code(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "F",
            EmploymentType::PartTime => "P",
            EmploymentType::Contract => "C",
            EmploymentType::Temporary => "T",
            EmploymentType::Internship => "I",
            EmploymentType::Volunteer => "V",
            EmploymentType::Other => "O",
        }
    }

    /// Best-effort parse of the strings seen in structured data and page copy.
    pub fn from_source(text: &str) -> Option<Self> {
        match normalize(text).as_str() {
            "fulltime" => Some(EmploymentType::FullTime),
            "parttime" => Some(EmploymentType::PartTime),
            "contract" | "contractor" => Some(EmploymentType::Contract),
            "temporary" | "temp" => Some(EmploymentType::Temporary),
            "internship" | "intern" => Some(EmploymentType::Internship),
            "volunteer" => Some(EmploymentType::Volunteer),
            "other" => Some(EmploymentType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkplaceType {
    OnSite,
    Remote,
    Hybrid,
}

impl WorkplaceType {
    pub fn code(&self) -> u8 {
        match self {
            WorkplaceType::OnSite => 1,
            WorkplaceType::Remote => 2,
            WorkplaceType::Hybrid => 3,
        }
    }

    pub fn from_source(text: &str) -> Option<Self> {
        match normalize(text).as_str() {
            "onsite" => Some(WorkplaceType::OnSite),
            "remote" | "telecommute" => Some(WorkplaceType::Remote),
            "hybrid" => Some(WorkplaceType::Hybrid),
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExperienceLevel {
    Internship = 1,
    EntryLevel = 2,
    Associate = 3,
    MidSenior = 4,
    Director = 5,
    Executive = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostedWithin {
    PastDay,
    PastWeek,
    PastMonth,
}

impl PostedWithin {
    pub fn code(&self) -> &'static str {
        match self {
            PostedWithin::PastDay => "r86400",
            PostedWithin::PastWeek => "r604800",
            PostedWithin::PastMonth => "r2592000",
        }
    }
}

/// Output of the location resolver for one input string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    /// The user's original input text.
    pub text: String,
    /// Canonical region identifier from the autocomplete service.
    pub geo_id: String,
    /// Display text of the selected candidate.
    pub display: String,
    /// True when selection fell back to the top-ranked candidate
    /// rather than an exact display-text match.
    pub ambiguous: bool,
}

/// One (title, location, filters) combination: the unit of scheduling and retry.
/// Carries no mutable state and is consumed exactly once by the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchUnit {
    pub title: String,
    pub location: ResolvedLocation,
    pub filters: SearchFilters,
    pub page_cap: u32,
    pub max_items: Option<usize>,
}

/// A raw listing payload at summary granularity, plus the detail payload once
/// fetched. Destroyed after a successful parse or after exhausting retries.
#[derive(Debug, Clone)]
pub struct RawFragment {
    pub job_id: String,
    pub url: String,
    /// Unparsed JSON text of the list-page snippet.
    pub summary: String,
    /// Unparsed HTML of the detail page, when the follow-up fetch succeeded.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub text: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

impl Salary {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLocation {
    pub text: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLocation {
    pub text: Option<String>,
    pub parsed: Option<ParsedLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyMethod {
    pub url: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub name: Option<String>,
    pub employee_count: Option<u32>,
    pub industries: Vec<String>,
    pub logo_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub headquarters: Option<String>,
}

/// Terminal, immutable output record. Field names are a compatibility
/// contract with downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub job_state: String,
    pub posted_date: Option<DateTime<Utc>>,
    pub description_text: Option<String>,
    pub description_html: Option<String>,
    pub location: JobLocation,
    pub employment_type: Option<EmploymentType>,
    pub workplace_type: Option<WorkplaceType>,
    pub salary: Salary,
    pub company: CompanyRecord,
    pub benefits: Vec<String>,
    pub applicants: Option<u32>,
    pub views: Option<u32>,
    pub apply_method: Option<ApplyMethod>,
    pub job_functions: Vec<String>,
    pub expire_at: Option<DateTime<Utc>>,
    /// Optional fields absent from the source payloads. A field is absent
    /// if and only if it appears here; list fields (`benefits`,
    /// `jobFunctions`) count as absent when empty.
    pub missing_fields: Vec<String>,
}

impl JobRecord {
    pub fn is_partial(&self) -> bool {
        !self.missing_fields.is_empty()
    }
}
