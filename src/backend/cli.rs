use futures_util::StreamExt;
use std::{collections::BTreeSet, process::Stdio};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, info, warn};

use super::{
    Backend, BackendReply, BackendStream, HookDecision, QueryOptions, StreamChunk, ToolHook,
    events::{ContentBlock, ResultEvent, StreamEvent, parse_event},
};
use crate::{
    config::CliConfig,
    error::BackendError,
    models::Usage,
    tools::{ToolCallScanner, ToolSpec, tools_system_prompt},
};

/// Runs queries through the `claude` command line in print mode.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeCli {
    config: CliConfig,
}

impl ClaudeCodeCli {
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(CliConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Builds the process invocation. With `tools`, their registration is added to
    /// the system prompt and permission prompts are bypassed.
    ///
    /// The prompt goes last, after `--`, so text starting with a dash is never read as a flag.
    #[must_use]
    pub fn build_command(
        &self,
        prompt: &str,
        options: &QueryOptions,
        tools: Option<&[ToolSpec]>,
    ) -> Command {
        let mut command = Command::new(&self.config.program);
        command.args(&self.config.program_args);
        command.arg("-p");
        command.args(["--output-format", "stream-json", "--verbose"]);
        command
            .arg("--max-turns")
            .arg(options.max_turns.max(1).to_string());

        let (system_prompt, permission_mode) = match tools {
            Some(tools) => (
                tools_system_prompt(&options.system_prompt, tools, self.config.tool_syntax),
                "bypassPermissions",
            ),
            None => (
                options.system_prompt.clone(),
                self.config.permission_mode.as_str(),
            ),
        };
        if !system_prompt.is_empty() {
            command.arg("--system-prompt").arg(system_prompt);
        }
        command.arg("--permission-mode").arg(permission_mode);

        if !self.config.allowed_tools.is_empty() {
            command
                .arg("--allowedTools")
                .arg(self.config.allowed_tools.join(","));
        }
        if let Some(model) = &self.config.model {
            command.arg("--model").arg(model);
        }

        let attachment_dirs: BTreeSet<_> = options
            .attachments
            .iter()
            .filter_map(|path| path.parent())
            .collect();
        for dir in attachment_dirs {
            command.arg("--add-dir").arg(dir);
        }
        command.args(&self.config.extra_args);
        command.arg("--").arg(prompt);

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn(&self, mut command: Command) -> Result<RunningQuery, BackendError> {
        debug!("Spawning {}", self.config.program.display());
        let mut child = command.spawn().map_err(|e| {
            error!("Failed to spawn {}: {e}", self.config.program.display());
            BackendError::Spawn(e)
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Protocol("stdout was not captured".to_string()))?;
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = String::new();
                if let Err(e) = stderr.read_to_string(&mut buffer).await {
                    debug!("Failed to read stderr: {e}");
                }
                buffer
            })
        });
        Ok(RunningQuery {
            child,
            lines: FramedRead::new(stdout, LinesCodec::new()),
            stderr,
        })
    }

    async fn run(
        &self,
        prompt: &str,
        options: &QueryOptions,
        tools: Option<(&[ToolSpec], &dyn ToolHook)>,
    ) -> Result<BackendReply, BackendError> {
        let command = self.build_command(prompt, options, tools.map(|(specs, _)| specs));
        let mut running = self.spawn(command)?;
        let mut turn = TurnState::new(tools, &self.config);

        while let Some(line) = running.lines.next().await {
            let line = line?;
            let Some(event) = parse_event(&line)? else {
                continue;
            };
            turn.absorb(event);
            if turn.should_stop() {
                info!("Tool call captured, ending backend turn early");
                running.stop().await;
                return turn.into_reply();
            }
        }

        turn.finish();
        let exit_failure = running.finish().await?;
        turn.into_reply_checked(exit_failure.as_ref())
    }
}

struct RunningQuery {
    child: Child,
    lines: FramedRead<ChildStdout, LinesCodec>,
    stderr: Option<JoinHandle<String>>,
}

impl RunningQuery {
    async fn stop(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Backend process already gone: {e}");
        }
    }

    /// Waits for exit and returns the exit failure, if any, with captured stderr.
    async fn finish(mut self) -> Result<Option<(String, String)>, BackendError> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if status.success() {
            Ok(None)
        } else {
            Ok(Some((status.to_string(), stderr)))
        }
    }
}

/// Accumulates one backend run: text, captured tool calls and the final result.
struct TurnState<'h> {
    text: String,
    scanner: Option<ToolCallScanner>,
    hook: Option<&'h dyn ToolHook>,
    registered: BTreeSet<String>,
    denied_in_text: bool,
    denied_natively: bool,
    result: Option<ResultEvent>,
}

impl<'h> TurnState<'h> {
    fn new(tools: Option<(&[ToolSpec], &'h dyn ToolHook)>, config: &CliConfig) -> Self {
        let (scanner, hook, registered) = match tools {
            Some((specs, hook)) => (
                Some(ToolCallScanner::new(config.tool_syntax)),
                Some(hook),
                specs.iter().map(|spec| spec.name.clone()).collect(),
            ),
            None => (None, None, BTreeSet::new()),
        };
        Self {
            text: String::new(),
            scanner,
            hook,
            registered,
            denied_in_text: false,
            denied_natively: false,
            result: None,
        }
    }

    /// Feeds one event and returns the text it added.
    fn absorb(&mut self, event: StreamEvent) -> String {
        match event {
            StreamEvent::Assistant { message } => {
                let mut added = String::new();
                for block in message.content {
                    match block {
                        ContentBlock::Text { text } => {
                            added.push_str(&self.push_text(&text));
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            debug!("Backend tool use {name} ({id})");
                            if self.registered.contains(&name)
                                && let Some(hook) = self.hook
                                && hook.before_tool_use(&name, &input) == HookDecision::Deny
                            {
                                self.denied_natively = true;
                            }
                        }
                        ContentBlock::Other => {}
                    }
                }
                added
            }
            StreamEvent::Result(result) => {
                debug!(
                    "Backend finished: subtype={} turns={:?}",
                    result.subtype, result.num_turns
                );
                self.result = Some(result);
                String::new()
            }
            StreamEvent::Other => String::new(),
        }
    }

    /// Appends a text block and returns what was appended, separator included.
    fn push_text(&mut self, text: &str) -> String {
        let mut appended = String::with_capacity(text.len() + 1);
        if !text.is_empty() && self.text.ends_with(|c: char| !c.is_whitespace()) {
            appended.push('\n');
        }
        appended.push_str(text);
        self.text.push_str(&appended);
        if let Some(scanner) = self.scanner.as_mut() {
            for call in scanner.push(text) {
                if let Some(hook) = self.hook
                    && hook.before_tool_use(&call.name, &call.args) == HookDecision::Deny
                {
                    self.denied_in_text = true;
                }
            }
        }
        appended
    }

    fn should_stop(&self) -> bool {
        self.denied_natively
            || (self.denied_in_text
                && self.scanner.as_ref().is_some_and(ToolCallScanner::block_closed))
    }

    /// Handles a tools block left open when output ended.
    fn finish(&mut self) {
        let Some(call) = self.scanner.as_mut().and_then(ToolCallScanner::finish) else {
            return;
        };
        if let Some(hook) = self.hook
            && hook.before_tool_use(&call.name, &call.args) == HookDecision::Deny
        {
            self.denied_in_text = true;
        }
    }

    fn reply_text(&self) -> String {
        let text = match &self.scanner {
            Some(scanner) if scanner.in_block() => scanner.text().to_string(),
            _ => self.text.clone(),
        };
        if text.trim().is_empty() {
            self.result
                .as_ref()
                .and_then(|result| result.result.clone())
                .unwrap_or(text)
        } else {
            text
        }
    }

    fn into_reply(self) -> Result<BackendReply, BackendError> {
        Ok(BackendReply {
            text: self.reply_text(),
            usage: self.result.as_ref().map_or(
                Usage {
                    requests: 1,
                    ..Usage::default()
                },
                ResultEvent::usage,
            ),
        })
    }

    fn into_reply_checked(
        self,
        exit_failure: Option<&(String, String)>,
    ) -> Result<BackendReply, BackendError> {
        let captured = self.denied_in_text || self.denied_natively;
        match (&self.result, exit_failure) {
            (Some(result), _) if result.is_failure() && !captured && self.text.trim().is_empty() => {
                let message = result
                    .result
                    .clone()
                    .unwrap_or_else(|| result.subtype.clone());
                error!("Backend reported failure: {message}");
                Err(BackendError::Reported(message))
            }
            (Some(result), _) => {
                if result.is_failure() {
                    warn!("Backend ended with {} after producing output", result.subtype);
                }
                self.into_reply()
            }
            (None, Some((status, stderr))) => {
                error!("Backend exited with {status}: {stderr}");
                Err(BackendError::Exited {
                    status: status.clone(),
                    stderr: stderr.clone(),
                })
            }
            (None, None) if captured || !self.text.is_empty() => self.into_reply(),
            (None, None) => Err(BackendError::Protocol(
                "backend produced no result event".to_string(),
            )),
        }
    }
}

impl Backend for ClaudeCodeCli {
    async fn simple_query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<BackendReply, BackendError> {
        let reply = self.run(prompt, options, None).await?;
        info!(
            "Claude command completed, response length: {}",
            reply.text.len()
        );
        Ok(reply)
    }

    async fn tool_query(
        &self,
        prompt: &str,
        tools: &[ToolSpec],
        options: &QueryOptions,
        hook: &dyn ToolHook,
    ) -> Result<BackendReply, BackendError> {
        let reply = self.run(prompt, options, Some((tools, hook))).await?;
        info!(
            "Claude tool query completed, response length: {}",
            reply.text.len()
        );
        Ok(reply)
    }

    fn stream_query(&self, prompt: String, options: QueryOptions) -> BackendStream<'_> {
        Box::pin(async_stream::stream! {
            let command = self.build_command(&prompt, &options, None);
            let mut running = match self.spawn(command) {
                Ok(running) => running,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut turn = TurnState::new(None, &self.config);
            let mut streamed = false;

            while let Some(line) = running.lines.next().await {
                let event = match line.map_err(BackendError::from).and_then(|line| {
                    parse_event(&line).map_err(BackendError::from)
                }) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                let added = turn.absorb(event);
                if !added.is_empty() {
                    streamed = true;
                    yield Ok(StreamChunk::TextDelta(added));
                }
            }

            match running.finish().await {
                Ok(exit_failure) => match turn.into_reply_checked(exit_failure.as_ref()) {
                    Ok(reply) => {
                        // Only the result event carried text.
                        if !streamed && !reply.text.is_empty() {
                            yield Ok(StreamChunk::TextDelta(reply.text));
                        }
                        yield Ok(StreamChunk::Usage(reply.usage));
                    }
                    Err(e) => yield Err(e),
                },
                Err(e) => yield Err(e),
            }
        })
    }
}
