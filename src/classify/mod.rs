//! Severity classification and developer assignment.
//!
//! The pipeline is two stages, each with its own fallback:
//!
//! 1. [`RemoteClassifier::classify`] asks the hosted model for a severity and
//!    falls back to [`KeywordClassifier`].
//! 2. [`RemoteClassifier::suggest_developer`] asks the model for an assignee
//!    and falls back to the least-loaded developer ([`assign`]).
//!
//! [`Triage`] runs both stages for the bug and predict handlers.

pub mod assign;
pub mod keyword;
pub mod remote;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub use keyword::KeywordClassifier;
pub use remote::{KEYWORD_MODEL_VERSION, RemoteClassifier};

use crate::config::LlmConfig;
use crate::llm::{CompletionModel, GroqClient};
use crate::models::{DeveloperCandidate, Severity};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub severity: Severity,
    pub confidence: f64,
    pub reasoning: String,
    pub impact_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub developer_name: String,
    /// Set when the name resolves to a stored developer.
    pub developer_id: Option<i64>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Why a stage answered from its fallback instead of the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackCause {
    #[error("no model configured")]
    NotConfigured,
    #[error("remote call failed: {0}")]
    Remote(String),
    #[error("malformed model response: {0}")]
    Malformed(String),
    #[error("model picked unknown developer '{0}'")]
    UnknownDeveloper(String),
    #[error("no developers available")]
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Answered(T),
    Degraded { value: T, cause: FallbackCause },
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Answered(v) => v,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Answered(v) => v,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn cause(&self) -> Option<&FallbackCause> {
        match self {
            Outcome::Answered(_) => None,
            Outcome::Degraded { cause, .. } => Some(cause),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assessment {
    pub classification: Outcome<ClassificationResult>,
    pub assignment: Outcome<Suggestion>,
    /// Producer of `classification`, as recorded in the prediction log.
    pub model_version: String,
}

impl Assessment {
    pub fn severity(&self) -> Severity {
        self.classification.value().severity
    }

    pub fn confidence(&self) -> f64 {
        self.classification.value().confidence
    }
}

#[derive(Clone)]
pub struct Triage {
    classifier: RemoteClassifier,
}

impl Triage {
    pub fn new(classifier: RemoteClassifier) -> Self {
        Self { classifier }
    }

    /// Uses the hosted model when it is configured and the client can be built.
    pub fn from_config(llm: Option<&LlmConfig>) -> Self {
        let model: Option<Arc<dyn CompletionModel>> = match llm {
            Some(cfg) => match GroqClient::new(cfg.clone()) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    log::warn!("LLM client unavailable, keyword classification only: {e}");
                    None
                }
            },
            None => None,
        };
        Self::new(RemoteClassifier::new(model, KeywordClassifier::default()))
    }

    pub fn classifier(&self) -> &RemoteClassifier {
        &self.classifier
    }

    pub async fn assess(
        &self,
        title: &str,
        description: &str,
        candidates: &[DeveloperCandidate],
    ) -> Assessment {
        let classification = self.classifier.classify(title, description).await;
        let model_version = if classification.is_degraded() {
            KEYWORD_MODEL_VERSION.to_string()
        } else {
            self.classifier.model_version()
        };
        let full_text = format!("{title}\n\n{description}");
        let assignment = self
            .classifier
            .suggest_developer(&full_text, classification.value().severity, candidates)
            .await;
        Assessment {
            classification,
            assignment,
            model_version,
        }
    }
}
