//! Model-backed classification with a keyword fallback.
//!
//! Every public operation returns an [`Outcome`]: the model's answer, or the
//! deterministic fallback together with the reason the model was not used.
//! Nothing here returns an error to the caller.

use std::sync::Arc;

use serde_json::Value;

use super::assign::fallback_suggestion;
use super::keyword::KeywordClassifier;
use super::{ClassificationResult, FallbackCause, Outcome, Suggestion};
use crate::llm::{CompletionModel, CompletionRequest, LlmError};
use crate::models::{DeveloperCandidate, Severity};

pub const KEYWORD_MODEL_VERSION: &str = "keyword-v1";

const TEMPERATURE: f32 = 0.3;
const CLASSIFY_MAX_TOKENS: u32 = 500;
const SUGGEST_MAX_TOKENS: u32 = 300;
const DEFAULT_MODEL_CONFIDENCE: f64 = 0.7;

const CLASSIFY_SYSTEM: &str = "You are an expert software bug triaging system. \
Analyze bugs and classify their severity accurately.";

const SUGGEST_SYSTEM: &str =
    "You are an expert at matching bugs to developers based on their skills and workload.";

#[derive(Clone)]
pub struct RemoteClassifier {
    model: Option<Arc<dyn CompletionModel>>,
    fallback: KeywordClassifier,
}

impl RemoteClassifier {
    pub fn new(model: Option<Arc<dyn CompletionModel>>, fallback: KeywordClassifier) -> Self {
        Self { model, fallback }
    }

    /// Keyword heuristics only.
    pub fn offline() -> Self {
        Self::new(None, KeywordClassifier::default())
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Tag recorded in prediction logs for answers produced by the model.
    pub fn model_version(&self) -> String {
        match &self.model {
            Some(m) => format!("groq/{}", m.model_name()),
            None => KEYWORD_MODEL_VERSION.to_string(),
        }
    }

    pub async fn classify(&self, title: &str, description: &str) -> Outcome<ClassificationResult> {
        let Some(model) = &self.model else {
            return Outcome::Degraded {
                value: self.fallback.classify(title, description),
                cause: FallbackCause::NotConfigured,
            };
        };

        let request = CompletionRequest {
            system: CLASSIFY_SYSTEM.to_string(),
            user: classification_prompt(title, description),
            temperature: TEMPERATURE,
            max_tokens: CLASSIFY_MAX_TOKENS,
        };
        let parsed = match model.complete_json(request).await {
            Ok(raw) => parse_classification(&raw),
            Err(e) => Err(remote_cause(&e)),
        };
        match parsed {
            Ok(result) => Outcome::Answered(result),
            Err(cause) => {
                log::warn!("severity model unavailable, using keywords: {cause}");
                Outcome::Degraded {
                    value: self.fallback.classify(title, description),
                    cause,
                }
            }
        }
    }

    pub async fn suggest_developer(
        &self,
        description: &str,
        severity: Severity,
        candidates: &[DeveloperCandidate],
    ) -> Outcome<Suggestion> {
        if candidates.is_empty() {
            return Outcome::Degraded {
                value: fallback_suggestion(candidates),
                cause: FallbackCause::NoCandidates,
            };
        }
        let Some(model) = &self.model else {
            return Outcome::Degraded {
                value: fallback_suggestion(candidates),
                cause: FallbackCause::NotConfigured,
            };
        };

        let request = CompletionRequest {
            system: SUGGEST_SYSTEM.to_string(),
            user: developer_prompt(description, severity, candidates),
            temperature: TEMPERATURE,
            max_tokens: SUGGEST_MAX_TOKENS,
        };
        let parsed = match model.complete_json(request).await {
            Ok(raw) => parse_suggestion(&raw, candidates),
            Err(e) => Err(remote_cause(&e)),
        };
        match parsed {
            Ok(suggestion) => Outcome::Answered(suggestion),
            Err(cause) => {
                log::warn!("assignment model unavailable, using workload rule: {cause}");
                Outcome::Degraded {
                    value: fallback_suggestion(candidates),
                    cause,
                }
            }
        }
    }
}

fn remote_cause(err: &LlmError) -> FallbackCause {
    if err.is_timeout() {
        FallbackCause::Remote("request timed out".to_string())
    } else {
        FallbackCause::Remote(err.to_string())
    }
}

fn classification_prompt(title: &str, description: &str) -> String {
    format!(
        r#"Analyze this bug report and classify its severity.

Bug Title: {title}

Bug Description: {description}

Consider these factors:
1. Impact on users (how many users affected?)
2. System stability (does it crash the system?)
3. Security implications (is there a security risk?)
4. Data integrity (can it cause data loss?)
5. Urgency (how quickly must it be fixed?)

Severity Levels:
- Critical: System crashes, security vulnerabilities, data loss, affects all users
- High: Major functionality broken, affects many users, no workaround
- Medium: Functionality impaired, affects some users, workaround exists
- Low: Minor issues, cosmetic problems, affects few users

Respond in JSON format:
{{
    "severity": "Critical|High|Medium|Low",
    "confidence": 0.0-1.0,
    "reasoning": "brief explanation of why this severity was chosen",
    "impact_areas": ["list", "of", "affected", "areas"]
}}"#
    )
}

fn developer_prompt(description: &str, severity: Severity, candidates: &[DeveloperCandidate]) -> String {
    let roster = candidates
        .iter()
        .map(|d| {
            format!(
                "- {}: Skills: {}, Current workload: {} bugs",
                d.name,
                d.skills.join(", "),
                d.workload
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Given this bug and list of developers, suggest the best developer to assign.

Bug Description: {description}
Severity: {severity}

Available Developers:
{roster}

Consider:
1. Developer skills matching the bug type
2. Current workload (prefer less busy developers)
3. Severity (critical bugs need experienced developers)

Respond in JSON format:
{{
    "developer_name": "name of suggested developer",
    "confidence": 0.0-1.0,
    "reasoning": "why this developer is the best match"
}}"#
    )
}

fn parse_object(raw: &str) -> Result<serde_json::Map<String, Value>, FallbackCause> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FallbackCause::Malformed("expected a JSON object".to_string())),
        Err(e) => Err(FallbackCause::Malformed(e.to_string())),
    }
}

fn confidence_of(map: &serde_json::Map<String, Value>) -> f64 {
    let raw = match map.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_MODEL_CONFIDENCE,
    }
}

/// Normalizes a model reply: unknown severities become Medium, confidence is clamped.
pub(crate) fn parse_classification(raw: &str) -> Result<ClassificationResult, FallbackCause> {
    let map = parse_object(raw)?;
    let severity = map
        .get("severity")
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<Severity>().ok())
        .unwrap_or(Severity::Medium);
    let reasoning = map
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("AI classification")
        .to_string();
    let impact_areas = map
        .get("impact_areas")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ClassificationResult {
        severity,
        confidence: confidence_of(&map),
        reasoning,
        impact_areas,
    })
}

pub(crate) fn parse_suggestion(
    raw: &str,
    candidates: &[DeveloperCandidate],
) -> Result<Suggestion, FallbackCause> {
    let map = parse_object(raw)?;
    let name = map
        .get("developer_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| FallbackCause::Malformed("missing developer_name".to_string()))?;
    let chosen = candidates
        .iter()
        .find(|d| d.name == name)
        .or_else(|| candidates.iter().find(|d| d.name.eq_ignore_ascii_case(name)))
        .ok_or_else(|| FallbackCause::UnknownDeveloper(name.to_string()))?;

    Ok(Suggestion {
        developer_name: chosen.name.clone(),
        developer_id: chosen.id,
        confidence: confidence_of(&map),
        reasoning: map
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("AI suggestion")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Result as LlmResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned replies in order; an `Err` entry simulates a failed call.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete_json(&self, request: CompletionRequest) -> LlmResult<String> {
            self.prompts.lock().unwrap().push(request.user);
            match self.replies.lock().unwrap().pop() {
                Some(Ok(body)) => Ok(body),
                Some(Err(msg)) => Err(LlmError::Provider(msg)),
                None => Err(LlmError::InvalidResponse("script exhausted".into())),
            }
        }
    }

    fn classifier(model: Arc<ScriptedModel>) -> RemoteClassifier {
        RemoteClassifier::new(
            Some(model as Arc<dyn CompletionModel>),
            KeywordClassifier::default(),
        )
    }

    fn candidates() -> Vec<DeveloperCandidate> {
        vec![
            DeveloperCandidate {
                id: Some(1),
                name: "Ana".into(),
                skills: vec!["rust".into(), "sql".into()],
                workload: 3,
            },
            DeveloperCandidate {
                id: Some(2),
                name: "Bo".into(),
                skills: vec!["css".into()],
                workload: 1,
            },
        ]
    }

    const TITLE: &str = "Checkout broken";
    const DESCRIPTION: &str = "Payment fails at the last step for every card";

    #[tokio::test]
    async fn model_answer_is_used() {
        let model = ScriptedModel::new(vec![Ok(
            r#"{"severity":"High","confidence":0.91,"reasoning":"payments","impact_areas":["checkout"]}"#,
        )]);
        let out = classifier(model.clone()).classify(TITLE, DESCRIPTION).await;
        assert!(!out.is_degraded());
        let result = out.into_inner();
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.confidence, 0.91);
        assert_eq!(result.impact_areas, vec!["checkout".to_string()]);
        assert!(model.prompts.lock().unwrap()[0].contains("Bug Title: Checkout broken"));
    }

    #[tokio::test]
    async fn remote_failure_matches_keyword_result() {
        let model = ScriptedModel::new(vec![Err("connection reset")]);
        let out = classifier(model).classify(TITLE, DESCRIPTION).await;
        let expected = KeywordClassifier::default().score(TITLE, DESCRIPTION);
        match out {
            Outcome::Degraded { value, cause } => {
                assert_eq!((value.severity, value.confidence), expected);
                assert!(matches!(cause, FallbackCause::Remote(_)));
            }
            Outcome::Answered(_) => panic!("expected fallback"),
        }
    }

    #[tokio::test]
    async fn non_json_reply_falls_back() {
        let model = ScriptedModel::new(vec![Ok("Severity: High, I think")]);
        let out = classifier(model).classify(TITLE, DESCRIPTION).await;
        assert!(matches!(
            out,
            Outcome::Degraded {
                cause: FallbackCause::Malformed(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_model_falls_back_without_calling_out() {
        let out = RemoteClassifier::offline().classify(TITLE, DESCRIPTION).await;
        assert!(matches!(
            out,
            Outcome::Degraded {
                cause: FallbackCause::NotConfigured,
                ..
            }
        ));
        assert_eq!(RemoteClassifier::offline().model_version(), KEYWORD_MODEL_VERSION);
    }

    #[test]
    fn classification_is_normalized() {
        let r = parse_classification(r#"{"severity":"Blocker","confidence":4.2}"#).unwrap();
        assert_eq!(r.severity, Severity::Medium);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.reasoning, "AI classification");
        assert!(r.impact_areas.is_empty());

        let r = parse_classification(r#"{"severity":"Low","confidence":-1}"#).unwrap();
        assert_eq!(r.confidence, 0.0);

        let r = parse_classification(r#"{"severity":"Critical","confidence":"0.8"}"#).unwrap();
        assert_eq!(r.severity, Severity::Critical);
        assert_eq!(r.confidence, 0.8);

        let r = parse_classification(r#"{"severity":"High"}"#).unwrap();
        assert_eq!(r.confidence, DEFAULT_MODEL_CONFIDENCE);

        assert!(parse_classification("[1,2]").is_err());
    }

    #[tokio::test]
    async fn model_pick_is_resolved_to_a_candidate() {
        let model = ScriptedModel::new(vec![Ok(
            r#"{"developer_name":"ana","confidence":0.8,"reasoning":"knows rust"}"#,
        )]);
        let out = classifier(model.clone())
            .suggest_developer(DESCRIPTION, Severity::High, &candidates())
            .await;
        let s = out.into_inner();
        assert_eq!(s.developer_name, "Ana");
        assert_eq!(s.developer_id, Some(1));
        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("- Ana: Skills: rust, sql, Current workload: 3 bugs"));
        assert!(prompt.contains("Severity: High"));
    }

    #[tokio::test]
    async fn unknown_pick_uses_workload_rule() {
        let model = ScriptedModel::new(vec![Ok(r#"{"developer_name":"Zed","confidence":0.9}"#)]);
        let out = classifier(model)
            .suggest_developer(DESCRIPTION, Severity::Low, &candidates())
            .await;
        assert!(out.is_degraded());
        assert_eq!(out.value().developer_name, "Bo");
    }

    #[tokio::test]
    async fn no_candidates_is_unassigned_even_with_a_model() {
        let model = ScriptedModel::new(vec![]);
        let out = classifier(model.clone())
            .suggest_developer(DESCRIPTION, Severity::Critical, &[])
            .await;
        assert_eq!(out.value().developer_name, "Unassigned");
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
