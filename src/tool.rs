use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::FailureKind;

/// Structured result of a tool invocation. Failures are captured as values
/// at the tool boundary so one tool's error can never crash a sibling
/// running in the same parallel stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { value: Value },
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn success(value: impl Into<Value>) -> Self {
        Outcome::Success {
            value: value.into(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The success payload, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Success { value } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    Object,
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
        }
    }
}

/// One entry in a tool's ordered parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    /// An optional parameter with no default. Absent means absent.
    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, kind: ParamKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default.into()),
        }
    }
}

/// A tool's execution body. Implementations own their external clients and
/// breaker state, and must return failures as `Outcome::Failure` rather
/// than panicking or bubbling raw errors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &Value) -> Outcome;
}

/// A single named, asynchronously-invokable operation. Constructed once at
/// provider registration time and immutable afterwards.
pub struct Tool {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    handler: Arc<dyn ToolHandler>,
    retry_safe: bool,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            handler: Arc::new(handler),
            retry_safe: true,
        }
    }

    /// Mark the tool as unsafe to retry blindly: its side effects are not
    /// idempotent (sending mail, firing a reminder). A caller retrying after
    /// a `Failure` may duplicate the side effect; the core does not dedupe.
    pub fn not_retry_safe(mut self) -> Self {
        self.retry_safe = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_retry_safe(&self) -> bool {
        self.retry_safe
    }

    /// The planner-facing schema for this tool.
    pub fn manifest(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.params,
            "retry_safe": self.retry_safe,
        })
    }

    /// Validate and normalize arguments, then run the handler. Malformed
    /// arguments never reach the handler; they come back as
    /// `Failure(Validation)` with no retry.
    pub async fn invoke(&self, args: &Value) -> Outcome {
        let normalized = match self.normalize(args) {
            Ok(v) => v,
            Err(message) => return Outcome::failure(FailureKind::Validation, message),
        };
        self.handler.call(&normalized).await
    }

    /// Invoke with a caller-imposed deadline. Expiry is reported as
    /// `Failure(Timeout)`; the underlying call is not cancelled beyond being
    /// dropped, so non-retry-safe tools may still have taken effect.
    pub async fn invoke_with_deadline(&self, args: &Value, deadline: Duration) -> Outcome {
        match tokio::time::timeout(deadline, self.invoke(args)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::failure(
                FailureKind::Timeout,
                format!("tool `{}` did not settle within {deadline:?}", self.name),
            ),
        }
    }

    /// Check supplied args against the declared schema. Declared parameters
    /// are type-checked and defaults filled in; undeclared keys are dropped
    /// so a generic workflow payload can be handed to any tool.
    fn normalize(&self, args: &Value) -> Result<Value, String> {
        let supplied = match args {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(format!(
                    "tool `{}` arguments must be a JSON object, got {other}",
                    self.name
                ))
            }
        };

        let mut normalized = Map::new();
        for spec in &self.params {
            match supplied.get(&spec.name) {
                Some(Value::Null) | None => {
                    if spec.required {
                        return Err(format!(
                            "tool `{}` missing required parameter `{}`",
                            self.name, spec.name
                        ));
                    }
                    if let Some(default) = &spec.default {
                        normalized.insert(spec.name.clone(), default.clone());
                    }
                }
                Some(value) if spec.kind.matches(value) => {
                    normalized.insert(spec.name.clone(), value.clone());
                }
                Some(value) => {
                    return Err(format!(
                        "tool `{}` parameter `{}` expects a {}, got {value}",
                        self.name,
                        spec.name,
                        spec.kind.label()
                    ));
                }
            }
        }
        Ok(Value::Object(normalized))
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("retry_safe", &self.retry_safe)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoArgs;

    #[async_trait]
    impl ToolHandler for EchoArgs {
        async fn call(&self, args: &Value) -> Outcome {
            Outcome::success(args.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl ToolHandler for Slow {
        async fn call(&self, _args: &Value) -> Outcome {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Outcome::success(json!("done"))
        }
    }

    fn greet_tool() -> Tool {
        Tool::new(
            "greet",
            "Greets someone by name",
            vec![
                ParamSpec::required("name", ParamKind::String),
                ParamSpec::with_default("shout", ParamKind::Boolean, false),
                ParamSpec::optional("times", ParamKind::Integer),
            ],
            EchoArgs,
        )
    }

    #[tokio::test]
    async fn missing_required_param_is_validation_failure() {
        let outcome = greet_tool().invoke(&json!({})).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn defaults_are_applied() {
        let outcome = greet_tool().invoke(&json!({"name": "ada"})).await;
        let value = outcome.value().unwrap();
        assert_eq!(value["name"], "ada");
        assert_eq!(value["shout"], false);
        assert!(value.get("times").is_none());
    }

    #[tokio::test]
    async fn wrong_type_is_validation_failure() {
        let outcome = greet_tool().invoke(&json!({"name": 7})).await;
        match outcome {
            Outcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Validation);
                assert!(message.contains("expects a string"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undeclared_keys_are_dropped() {
        let outcome = greet_tool()
            .invoke(&json!({"name": "ada", "request": "hello", "context": {}}))
            .await;
        let value = outcome.value().unwrap();
        assert!(value.get("request").is_none());
        assert!(value.get("context").is_none());
    }

    #[tokio::test]
    async fn null_counts_as_absent() {
        let outcome = greet_tool()
            .invoke(&json!({"name": "ada", "times": null}))
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn non_object_args_rejected() {
        let outcome = greet_tool().invoke(&json!([1, 2])).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn deadline_expiry_is_timeout_failure() {
        let tool = Tool::new("slow", "Sleeps for a while", vec![], Slow);
        let outcome = tool
            .invoke_with_deadline(&json!({}), Duration::from_millis(10))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn manifest_lists_ordered_params() {
        let manifest = greet_tool().manifest();
        assert_eq!(manifest["name"], "greet");
        assert_eq!(manifest["parameters"][0]["name"], "name");
        assert_eq!(manifest["parameters"][1]["name"], "shout");
        assert_eq!(manifest["retry_safe"], true);
    }

    #[test]
    fn outcome_serde_roundtrip() {
        let failure = Outcome::failure(FailureKind::NotFound, "no such page");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "not_found");
        let back: Outcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, failure);
    }
}
