pub mod cli;
pub mod events;

use futures_util::Stream;
use serde_json::{Map, Value};
use std::{future::Future, path::PathBuf, pin::Pin};

use crate::{error::BackendError, models::Usage, tools::ToolSpec};

pub use cli::ClaudeCodeCli;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub system_prompt: String,
    pub max_turns: u32,
    /// Files the prompt refers to. They exist for the duration of the query.
    pub attachments: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendReply {
    pub text: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    TextDelta(String),
    Usage(Usage),
}

pub type BackendStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamChunk, BackendError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    /// The backend must not run the tool and should end its turn.
    Deny,
}

/// Called synchronously before the backend acts on a tool call.
pub trait ToolHook: Send + Sync {
    fn before_tool_use(&self, tool_name: &str, arguments: &Map<String, Value>) -> HookDecision;
}

pub trait Backend: Send + Sync {
    fn simple_query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> impl Future<Output = Result<BackendReply, BackendError>> + Send;

    /// Runs a query with external tools registered. Every call the backend decides
    /// to make is passed to `hook` first.
    fn tool_query(
        &self,
        prompt: &str,
        tools: &[ToolSpec],
        options: &QueryOptions,
        hook: &dyn ToolHook,
    ) -> impl Future<Output = Result<BackendReply, BackendError>> + Send;

    fn stream_query(&self, prompt: String, options: QueryOptions) -> BackendStream<'_> {
        Box::pin(async_stream::stream! {
            match self.simple_query(&prompt, &options).await {
                Ok(reply) => {
                    yield Ok(StreamChunk::TextDelta(reply.text));
                    yield Ok(StreamChunk::Usage(reply.usage));
                }
                Err(e) => yield Err(e),
            }
        })
    }
}
