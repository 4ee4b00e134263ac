//! `dispatch(name, arguments)` (spec §4.8): validates arguments against the
//! registered JSON schema, runs the handler under its configured timeout,
//! and captures exceptions as structured [`ToolError`]s. Every call is
//! traced with `(name, duration_ms, status)`.

use std::time::Instant;

use serde_json::Value;
use tracing::instrument;

use crate::error::ToolError;
use crate::registry::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Ok,
    Error,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub result: Option<Value>,
    pub error: Option<ToolError>,
    pub duration_ms: u64,
}

/// Validate `arguments` against `schema`. A valid schema with no violations
/// returns `Ok(())`; otherwise the first validation error is surfaced.
fn validate(schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ToolError::SchemaValidation(format!("invalid schema: {e}")))?;
    if let Err(first_error) = validator.validate(arguments) {
        return Err(ToolError::SchemaValidation(first_error.to_string()));
    }
    Ok(())
}

/// Dispatch one tool call. The dispatcher guarantees the caller never waits
/// longer than the tool's configured `timeout`, regardless of what the
/// handler does internally.
#[instrument(skip(registry, arguments), fields(tool = %name))]
pub async fn dispatch(registry: &ToolRegistry, name: &str, arguments: Value) -> DispatchOutcome {
    let start = Instant::now();

    let Some(def) = registry.get(name) else {
        let err = ToolError::UnknownTool(name.to_string());
        tracing::warn!(tool = name, "dispatch: unknown tool");
        return DispatchOutcome {
            status: DispatchStatus::Error,
            result: None,
            error: Some(err),
            duration_ms: elapsed_ms(start),
        };
    };

    if let Err(err) = validate(&def.json_schema, &arguments) {
        tracing::warn!(tool = name, error = %err, "dispatch: schema validation failed");
        return DispatchOutcome {
            status: DispatchStatus::Error,
            result: None,
            error: Some(err),
            duration_ms: elapsed_ms(start),
        };
    }

    match tokio::time::timeout(def.timeout, def.handler.call(arguments)).await {
        Ok(Ok(value)) => {
            tracing::info!(tool = name, duration_ms = elapsed_ms(start), status = "ok", "dispatch complete");
            DispatchOutcome {
                status: DispatchStatus::Ok,
                result: Some(value),
                error: None,
                duration_ms: elapsed_ms(start),
            }
        }
        Ok(Err(err)) => {
            tracing::warn!(tool = name, error = %err, "dispatch: handler error");
            DispatchOutcome {
                status: DispatchStatus::Error,
                result: None,
                error: Some(err),
                duration_ms: elapsed_ms(start),
            }
        }
        Err(_elapsed) => {
            let timeout_ms = def.timeout.as_millis() as u64;
            tracing::warn!(tool = name, timeout_ms, "dispatch: timed out");
            DispatchOutcome {
                status: DispatchStatus::Timeout,
                result: None,
                error: Some(ToolError::Timeout { timeout_ms }),
                duration_ms: elapsed_ms(start),
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
