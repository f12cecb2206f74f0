use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::ToolSpec;
use crate::{
    backend::{HookDecision, ToolHook},
    error::AdapterError,
    models::{ToolCall, ToolDefinition},
    schema::resolve_refs,
    utils::generate_call_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NoTools,
    ToolsRegistered,
    AwaitingCall,
    CallCaptured,
    ReturnedToFramework,
}

/// A call the backend decided to make, held until it is handed to the framework.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Map<String, Value>,
}

impl From<PendingToolCall> for ToolCall {
    fn from(pending: PendingToolCall) -> Self {
        ToolCall {
            tool_name: pending.tool_name,
            call_id: pending.call_id,
            arguments: pending.arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeOutcome {
    ToolCalls(Vec<ToolCall>),
    /// No registered tool was called; the backend text is the answer.
    Text,
}

impl ToolSpec {
    /// Converts a framework tool definition, resolving its parameter schema.
    ///
    /// # Errors
    /// Propagates schema resolution failures.
    pub fn from_definition(definition: &ToolDefinition) -> Result<Self, AdapterError> {
        Ok(Self {
            name: definition.name.clone(),
            description: definition.description.clone().unwrap_or_default(),
            input_schema: resolve_refs(&definition.parameters_json_schema)?,
        })
    }
}

/// Tracks tool registration and captures the backend's calls for one request.
///
/// As a [`ToolHook`] it records every call to a registered tool and denies its
/// execution, since the framework runs the real function.
#[derive(Debug)]
pub struct ToolBridge {
    specs: Vec<ToolSpec>,
    inner: Mutex<BridgeInner>,
}

#[derive(Debug)]
struct BridgeInner {
    state: BridgeState,
    pending: Vec<PendingToolCall>,
}

impl Default for ToolBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolBridge {
    #[must_use]
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            inner: Mutex::new(BridgeInner {
                state: BridgeState::NoTools,
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&mut self, specs: Vec<ToolSpec>) {
        if specs.is_empty() {
            return;
        }
        debug!(
            "Registering tools: {}",
            specs
                .iter()
                .map(|spec| spec.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.specs.extend(specs);
        self.lock().state = BridgeState::ToolsRegistered;
    }

    #[must_use]
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.lock().state
    }

    /// Marks the backend as running with tools enabled.
    pub fn begin(&self) {
        let mut inner = self.lock();
        if inner.state == BridgeState::ToolsRegistered {
            inner.state = BridgeState::AwaitingCall;
        }
    }

    /// Hands the captured calls over, in capture order.
    pub fn finish(&self) -> BridgeOutcome {
        let mut inner = self.lock();
        if inner.pending.is_empty() {
            return BridgeOutcome::Text;
        }
        inner.state = BridgeState::ReturnedToFramework;
        let calls = inner.pending.drain(..).map(ToolCall::from).collect();
        BridgeOutcome::ToolCalls(calls)
    }

    fn is_registered(&self, tool_name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name == tool_name)
    }
}

impl ToolHook for ToolBridge {
    fn before_tool_use(&self, tool_name: &str, arguments: &Map<String, Value>) -> HookDecision {
        if !self.is_registered(tool_name) {
            return HookDecision::Allow;
        }
        let mut inner = self.lock();
        if !matches!(
            inner.state,
            BridgeState::AwaitingCall | BridgeState::CallCaptured
        ) {
            return HookDecision::Allow;
        }
        let call_id = generate_call_id();
        info!("Captured tool call {tool_name} ({call_id})");
        inner.pending.push(PendingToolCall {
            tool_name: tool_name.to_string(),
            call_id,
            arguments: arguments.clone(),
        });
        inner.state = BridgeState::CallCaptured;
        HookDecision::Deny
    }
}
