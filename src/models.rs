use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MIN: usize = 10;
pub const LIST_LIMIT_MAX: i64 = 500;
pub const LIST_LIMIT_DEFAULT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum BugStatus {
    Open,
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl BugStatus {
    pub const ALL: [BugStatus; 4] = [
        BugStatus::Open,
        BugStatus::InProgress,
        BugStatus::Resolved,
        BugStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::Open => "Open",
            BugStatus::InProgress => "In Progress",
            BugStatus::Resolved => "Resolved",
            BugStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
pub enum DeveloperStatus {
    #[default]
    Active,
    Inactive,
    #[serde(rename = "On Leave")]
    #[sqlx(rename = "On Leave")]
    OnLeave,
}

// === bugs ===

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Bug {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub predicted_severity: Option<Severity>,
    pub confidence_score: Option<f64>,
    pub status: BugStatus,
    pub source: String,
    pub assigned_developer: Option<String>,
    pub assigned_developer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully triaged bug ready to be written.
#[derive(Debug, Clone)]
pub struct BugDraft {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: f64,
    pub source: String,
    pub assigned_developer: String,
    pub assigned_developer_id: Option<i64>,
}

fn default_source() -> String {
    "Manual".to_string()
}

#[derive(Debug, Deserialize)]
pub struct BugReport {
    pub title: String,
    pub description: String,
    #[serde(default = "default_source")]
    pub source: String,
}

impl BugReport {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_title(&self.title)?;
        check_description(&self.description)
    }
}

/// Partial update; only populated fields are written.
#[derive(Debug, Default, Deserialize)]
pub struct BugUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<BugStatus>,
    pub assigned_developer: Option<String>,
    pub severity: Option<Severity>,
}

impl BugUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.assigned_developer.is_none()
            && self.severity.is_none()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BugFilter {
    pub severity: Option<Severity>,
    pub status: Option<BugStatus>,
    pub source: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl BugFilter {
    pub fn page(&self) -> Result<Page, ApiError> {
        Page::from_query(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub fn from_query(skip: Option<i64>, limit: Option<i64>) -> Result<Self, ApiError> {
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(LIST_LIMIT_DEFAULT);
        if skip < 0 {
            return Err(ApiError::validation("skip", "must be greater than or equal to 0"));
        }
        if !(1..=LIST_LIMIT_MAX).contains(&limit) {
            return Err(ApiError::validation(
                "limit",
                format!("must be between 1 and {LIST_LIMIT_MAX}"),
            ));
        }
        Ok(Self { skip, limit })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: LIST_LIMIT_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PredictionLog {
    pub id: i64,
    pub bug_id: i64,
    pub model_version: String,
    pub predicted_severity: Severity,
    pub confidence: f64,
    pub features_used: Option<String>,
    pub prediction_time: DateTime<Utc>,
}

/// One classification to append to a bug's prediction log.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub model_version: String,
    pub predicted_severity: Severity,
    pub confidence: f64,
    pub features_used: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub title: String,
    pub description: String,
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_title(&self.title)?;
        check_description(&self.description)
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub severity: Severity,
    pub confidence: f64,
    pub suggested_developer: String,
    pub reasoning: String,
    pub impact_areas: Vec<String>,
    pub model_version: String,
    pub degraded: bool,
}

// === developers ===

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Developer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub skills: Json<Vec<String>>,
    pub workload: i64,
    pub status: DeveloperStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeveloper {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub workload: i64,
    #[serde(default)]
    pub status: DeveloperStatus,
}

impl CreateDeveloper {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_name(&self.name)?;
        check_email(&self.email)?;
        check_workload(self.workload)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeveloperUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub skills: Option<Vec<String>>,
    pub workload: Option<i64>,
    pub status: Option<DeveloperStatus>,
}

impl DeveloperUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.skills.is_none()
            && self.workload.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(workload) = self.workload {
            check_workload(workload)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeveloperQuery {
    pub status: Option<DeveloperStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DeveloperWorkload {
    pub developer_id: i64,
    pub developer_name: String,
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
}

/// What the assignment step needs to know about a developer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeveloperCandidate {
    pub id: Option<i64>,
    pub name: String,
    pub skills: Vec<String>,
    pub workload: i64,
}

impl From<Developer> for DeveloperCandidate {
    fn from(dev: Developer) -> Self {
        Self {
            id: Some(dev.id),
            name: dev.name,
            skills: dev.skills.0,
            workload: dev.workload,
        }
    }
}

// === stats ===

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_bugs: i64,
    pub by_severity: serde_json::Map<String, serde_json::Value>,
    pub by_status: serde_json::Map<String, serde_json::Value>,
    pub open_bugs: i64,
    pub closed_bugs: i64,
    pub average_confidence: f64,
    pub total_developers: i64,
}

// === api keys ===

#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub key_hash: String,
    pub key_preview: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub is_active: bool,
    pub usage_count: i64,
    pub rate_limit: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Requests counted against today's quota.
    pub fn used_today(&self, now: DateTime<Utc>) -> i64 {
        match self.last_used_at {
            Some(last) if last.date_naive() == now.date_naive() => self.usage_count,
            _ => 0,
        }
    }

    pub fn remaining_today(&self, now: DateTime<Utc>) -> i64 {
        (self.rate_limit - self.used_today(now)).max(0)
    }

    pub fn view(&self, key: Option<String>) -> ApiKeyView {
        ApiKeyView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            key,
            key_preview: format!("...{}", self.key_preview),
            is_active: self.is_active,
            usage_count: self.usage_count,
            rate_limit: self.rate_limit,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            expires_at: self.expires_at,
        }
    }
}

/// Row values for a freshly issued key; the plaintext key never reaches the store.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_hash: String,
    pub key_preview: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub rate_limit: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub key_preview: String,
    pub is_active: bool,
    pub usage_count: i64,
    pub rate_limit: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_rate_limit() -> i64 {
    1000
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: i64,
    pub expires_in_days: Option<i64>,
}

impl CreateApiKey {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_key_name(&self.name)?;
        check_email(&self.email)?;
        if let Some(company) = &self.company {
            if company.chars().count() > 100 {
                return Err(ApiError::validation("company", "must be at most 100 characters"));
            }
        }
        check_rate_limit(self.rate_limit)?;
        if let Some(days) = self.expires_in_days {
            if !(1..=365).contains(&days) {
                return Err(ApiError::validation("expires_in_days", "must be between 1 and 365"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub rate_limit: Option<i64>,
}

impl ApiKeyUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_active.is_none() && self.rate_limit.is_none()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            check_key_name(name)?;
        }
        if let Some(limit) = self.rate_limit {
            check_rate_limit(limit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ApiKeyStats {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub total_requests: i64,
    pub rate_limit: i64,
    pub remaining_requests: i64,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

// === field checks ===

fn check_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len < TITLE_MIN {
        return Err(ApiError::validation(
            "title",
            format!("must be at least {TITLE_MIN} characters"),
        ));
    }
    if len > TITLE_MAX {
        return Err(ApiError::validation(
            "title",
            format!("must be at most {TITLE_MAX} characters"),
        ));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() < DESCRIPTION_MIN {
        return Err(ApiError::validation(
            "description",
            format!("must be at least {DESCRIPTION_MIN} characters"),
        ));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if !(2..=100).contains(&len) {
        return Err(ApiError::validation("name", "must be between 2 and 100 characters"));
    }
    Ok(())
}

fn check_key_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(3..=100).contains(&len) {
        return Err(ApiError::validation("name", "must be between 3 and 100 characters"));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid || email.chars().count() > 100 {
        return Err(ApiError::validation("email", "must be a valid email address"));
    }
    Ok(())
}

fn check_workload(workload: i64) -> Result<(), ApiError> {
    if workload < 0 {
        return Err(ApiError::validation("workload", "must be greater than or equal to 0"));
    }
    Ok(())
}

fn check_rate_limit(limit: i64) -> Result<(), ApiError> {
    if !(100..=10_000).contains(&limit) {
        return Err(ApiError::validation("rate_limit", "must be between 100 and 10000"));
    }
    Ok(())
}
