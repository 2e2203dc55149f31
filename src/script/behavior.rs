//! Declarative handler behaviour

use crate::core::{handler_fn, HandlerFn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Run a handler only when a payload field equals a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadCondition {
    /// Dotted path into the payload, e.g. `user.tier`
    pub field: String,

    pub equals: Value,
}

impl PayloadCondition {
    pub fn matches(&self, payload: &Value) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        payload.pointer(&pointer) == Some(&self.equals)
    }
}

/// What a scripted handler does, applied in field order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerBehavior {
    /// Sleep before doing anything else
    #[serde(default)]
    pub delay_ms: Option<u64>,

    /// Merge these keys into the payload object
    #[serde(default)]
    pub patch: Option<serde_json::Map<String, Value>>,

    #[serde(default)]
    pub set_result: Option<Value>,

    #[serde(default)]
    pub jump_to: Option<i64>,

    #[serde(default)]
    pub abort: Option<String>,

    /// Return an error with this message
    #[serde(default)]
    pub fail: Option<String>,

    #[serde(default)]
    pub terminate: Option<Value>,

    /// Value returned from the handler
    #[serde(default)]
    pub returns: Option<Value>,
}

impl HandlerBehavior {
    pub fn validate(&self) -> anyhow::Result<()> {
        let endings = [
            self.abort.is_some(),
            self.fail.is_some(),
            self.terminate.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if endings > 1 {
            anyhow::bail!("only one of abort, fail and terminate may be set");
        }
        Ok(())
    }

    pub fn to_handler_fn(&self) -> HandlerFn {
        let behavior = self.clone();
        handler_fn(move |_payload, controller| {
            let behavior = behavior.clone();
            async move {
                if let Some(ms) = behavior.delay_ms {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                if let Some(patch) = behavior.patch {
                    controller.modify_payload(|payload| merge(payload, patch));
                }
                if let Some(value) = behavior.set_result {
                    controller.set_result(value);
                }
                if let Some(priority) = behavior.jump_to {
                    controller.jump_to_priority(priority);
                }
                if let Some(reason) = behavior.abort {
                    controller.abort(reason);
                }
                if let Some(message) = behavior.fail {
                    anyhow::bail!(message);
                }
                if let Some(value) = behavior.terminate {
                    controller.terminate(value);
                }
                Ok(behavior.returns.unwrap_or(Value::Null))
            }
        })
    }
}

fn merge(payload: Value, patch: serde_json::Map<String, Value>) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.extend(patch);
            Value::Object(map)
        }
        // Non-object payloads are replaced by the patch
        _ => Value::Object(patch),
    }
}
