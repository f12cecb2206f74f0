use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, error, info};

use crate::{
    adapters::{RequestAdapter, traits::RequestContext},
    backend::{Backend, QueryOptions, StreamChunk},
    config::{AdapterConfig, PROVIDER_NAME},
    conversion::{MaterializedPrompt, flatten, materialize},
    error::{AdapterError, BackendError},
    extract::extract,
    models::{
        ModelRequest, ModelResponse, OutputMode, RequestMode, Response, ResponseEvent,
        ToolDefinition, Usage,
    },
    schema::{DynamicTypeDescriptor, describe, resolve},
    tools::{BridgeOutcome, ToolBridge, ToolSpec},
    utils::generate_call_id,
};

pub type ResponseStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ResponseEvent, AdapterError>> + Send + 'a>>;

/// Everything one backend invocation needs. Attachment files are removed when this is dropped.
struct PreparedRequest {
    mode: RequestMode,
    prompt: MaterializedPrompt,
    options: QueryOptions,
    output: Option<OutputTarget>,
    tools: Vec<ToolSpec>,
}

struct OutputTarget {
    tool_name: String,
    descriptor: DynamicTypeDescriptor,
}

/// Presents a Claude Code backend to the agent framework as a model.
pub struct CodeAgentModel<B> {
    backend: B,
    config: AdapterConfig,
}

impl<B: Backend> CodeAgentModel<B> {
    /// # Errors
    /// Returns [`AdapterError::Attachment`] when the workspace directory cannot be created.
    pub fn new(backend: B, config: AdapterConfig) -> Result<Self, AdapterError> {
        std::fs::create_dir_all(&config.workspace_dir).map_err(|source| {
            AdapterError::Attachment {
                path: config.workspace_dir.clone(),
                source,
            }
        })?;
        info!("Attachment workspace: {}", config.workspace_dir.display());
        Ok(Self { backend, config })
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    #[must_use]
    pub fn system(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Runs one conversation turn against the backend.
    ///
    /// # Errors
    /// Any [`AdapterError`]. Backend failures arrive as [`AdapterError::BackendInvocation`];
    /// extraction and validation failures are returned as they are.
    pub async fn request(&self, request: &ModelRequest) -> Result<ModelResponse, AdapterError> {
        let prepared = self.prepare(request).await?;
        self.execute(&prepared).await
    }

    /// Streams one conversation turn. Plain text arrives as deltas; structured
    /// and tool-call replies arrive as a single part.
    ///
    /// Dropping the stream stops the backend and removes attachment files.
    pub fn request_stream(&self, request: ModelRequest) -> ResponseStream<'_> {
        Box::pin(async_stream::stream! {
            let prepared = match self.prepare(&request).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if prepared.mode != RequestMode::PlainText {
                match self.execute(&prepared).await {
                    Ok(response) => {
                        yield Ok(ResponseEvent::Part(response.response.clone()));
                        yield Ok(ResponseEvent::Done(response));
                    }
                    Err(e) => yield Err(e),
                }
                return;
            }

            let mut chunks = self
                .backend
                .stream_query(prepared.prompt.prompt.clone(), prepared.options.clone());
            let mut text = String::new();
            let mut usage = Usage::default();

            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(StreamChunk::TextDelta(delta)) => {
                        text.push_str(&delta);
                        yield Ok(ResponseEvent::TextDelta(delta));
                    }
                    Ok(StreamChunk::Usage(chunk_usage)) => usage += chunk_usage,
                    Err(e) => {
                        yield Err(backend_failure(e));
                        return;
                    }
                }
            }

            info!("Streamed plain text reply ({} output tokens)", usage.output_tokens);
            yield Ok(ResponseEvent::Done(self.respond(Response::Text { text }, usage)));
        })
    }

    async fn prepare(&self, request: &ModelRequest) -> Result<PreparedRequest, AdapterError> {
        let mode = select_mode(request)?;
        info!("Handling request in {mode:?} mode");

        let flattened = flatten(&request.messages)?;

        let output = match mode {
            RequestMode::Structured => Some(output_tool(request)?),
            RequestMode::ToolCall | RequestMode::PlainText => None,
        };
        let resolved_output = output
            .map(|tool| resolve(&tool.parameters_json_schema).map(|schema| (tool, schema)))
            .transpose()?;

        let adapter = RequestAdapter::for_request(
            &self.config,
            resolved_output.as_ref().map(|(_, schema)| schema),
        );
        let ctx = RequestContext { request, mode };

        let tools = match mode {
            RequestMode::ToolCall => request
                .function_tools
                .iter()
                .map(|definition| {
                    let mut spec = ToolSpec::from_definition(definition)?;
                    spec.description = adapter.adapt_tool_description(&spec.description, &ctx);
                    spec.input_schema = adapter.adapt_tool_schema(&spec.input_schema, &ctx);
                    Ok(spec)
                })
                .collect::<Result<Vec<_>, AdapterError>>()?,
            RequestMode::Structured | RequestMode::PlainText => {
                if !request.function_tools.is_empty() {
                    debug!(
                        "Ignoring {} function tool(s) in {mode:?} mode",
                        request.function_tools.len()
                    );
                }
                Vec::new()
            }
        };

        let mut prompt = materialize(
            &flattened.user_text,
            &flattened.attachments,
            &self.config.workspace_dir,
            self.config.keep_attachments,
        )
        .await?;
        prompt.prompt = adapter.adapt_user_prompt(&prompt.prompt, &ctx);

        let options = QueryOptions {
            system_prompt: adapter.adapt_system_prompt(&flattened.system, &ctx),
            max_turns: adapter.adapt_max_turns(self.config.text_max_turns, &ctx),
            attachments: prompt.paths(),
        };

        debug!(
            "--- ADAPTED PROMPT ---\nSystem: {}\nMax turns: {}\n\n{}\n--- END ADAPTED PROMPT ---",
            options.system_prompt, options.max_turns, prompt.prompt
        );

        Ok(PreparedRequest {
            mode,
            prompt,
            options,
            output: resolved_output.map(|(tool, schema)| OutputTarget {
                tool_name: tool.name.clone(),
                descriptor: describe(&schema),
            }),
            tools,
        })
    }

    async fn execute(&self, prepared: &PreparedRequest) -> Result<ModelResponse, AdapterError> {
        let prompt = prepared.prompt.prompt.as_str();
        let options = &prepared.options;

        match (&prepared.output, prepared.mode) {
            (Some(target), _) => {
                let reply = self
                    .backend
                    .simple_query(prompt, options)
                    .await
                    .map_err(backend_failure)?;
                let payload = extract(&reply.text, &target.descriptor)?;
                info!("Structured reply for {} validated", target.descriptor.name);
                Ok(self.respond(
                    Response::Structured {
                        tool_name: target.tool_name.clone(),
                        call_id: generate_call_id(),
                        payload,
                    },
                    reply.usage,
                ))
            }
            (None, RequestMode::ToolCall) => {
                let mut bridge = ToolBridge::new();
                bridge.register(prepared.tools.clone());
                bridge.begin();
                let reply = self
                    .backend
                    .tool_query(prompt, bridge.specs(), options, &bridge)
                    .await
                    .map_err(backend_failure)?;
                let response = match bridge.finish() {
                    BridgeOutcome::ToolCalls(calls) => {
                        info!("Returning {} tool call(s) to the framework", calls.len());
                        Response::ToolCalls { calls }
                    }
                    BridgeOutcome::Text => {
                        debug!("No registered tool was called; answering with text");
                        Response::Text { text: reply.text }
                    }
                };
                Ok(self.respond(response, reply.usage))
            }
            (None, _) => {
                let reply = self
                    .backend
                    .simple_query(prompt, options)
                    .await
                    .map_err(backend_failure)?;
                info!("Plain text reply ({} output tokens)", reply.usage.output_tokens);
                Ok(self.respond(Response::Text { text: reply.text }, reply.usage))
            }
        }
    }

    fn respond(&self, response: Response, usage: Usage) -> ModelResponse {
        ModelResponse {
            response,
            model_name: self.config.model_name.clone(),
            usage,
        }
    }
}

/// Picks the path for a request: output tool, function tools, then plain text.
///
/// # Errors
/// [`AdapterError::UnsupportedMode`] when the output mode and the output tools disagree.
pub fn select_mode(request: &ModelRequest) -> Result<RequestMode, AdapterError> {
    match request.output_mode {
        OutputMode::Tool if request.output_tools.is_empty() => Err(AdapterError::UnsupportedMode(
            "output tool mode requested without an output tool".to_string(),
        )),
        OutputMode::Tool => Ok(RequestMode::Structured),
        OutputMode::Text if !request.output_tools.is_empty() => {
            Err(AdapterError::UnsupportedMode(format!(
                "{} output tool(s) supplied while the output mode is text",
                request.output_tools.len()
            )))
        }
        OutputMode::Text if !request.function_tools.is_empty() => Ok(RequestMode::ToolCall),
        OutputMode::Text => Ok(RequestMode::PlainText),
    }
}

fn output_tool(request: &ModelRequest) -> Result<&ToolDefinition, AdapterError> {
    let tool = request
        .output_tools
        .first()
        .ok_or_else(|| AdapterError::UnsupportedMode("no output tool".to_string()))?;
    if request.output_tools.len() > 1 {
        debug!(
            "{} output tools supplied, using {}",
            request.output_tools.len(),
            tool.name
        );
    }
    Ok(tool)
}

fn backend_failure(error: BackendError) -> AdapterError {
    error!("Claude Code request failed: {error}");
    error.into()
}
