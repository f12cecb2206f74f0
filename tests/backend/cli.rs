use cc_bridge::{
    backend::{ClaudeCodeCli, QueryOptions},
    config::{CliConfig, ToolSyntax},
    models::ToolDefinition,
    tools::ToolSpec,
};
use rstest::rstest;
use serde_json::json;
use std::path::PathBuf;

fn args_of(cli: &ClaudeCodeCli, options: &QueryOptions, tools: Option<&[ToolSpec]>) -> Vec<String> {
    cli.build_command("hello", options, tools)
        .as_std()
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

fn get_location() -> ToolSpec {
    ToolSpec::from_definition(&ToolDefinition::new(
        "get_location",
        "Look up a city.",
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
    ))
    .expect("acyclic schema")
}

#[rstest]
fn test_simple_command_arguments() {
    let cli = ClaudeCodeCli::new(CliConfig {
        model: Some("sonnet".to_string()),
        ..CliConfig::default()
    });
    let options = QueryOptions {
        system_prompt: "Be brief.".to_string(),
        max_turns: 3,
        attachments: vec![
            PathBuf::from("/tmp/a/one.png"),
            PathBuf::from("/tmp/a/two.png"),
            PathBuf::from("/tmp/b/three.png"),
        ],
    };
    assert_eq!(
        args_of(&cli, &options, None),
        vec![
            "-p",
            "--output-format",
            "stream-json",
            "--verbose",
            "--max-turns",
            "3",
            "--system-prompt",
            "Be brief.",
            "--permission-mode",
            "acceptEdits",
            "--allowedTools",
            "Read,Write",
            "--model",
            "sonnet",
            "--add-dir",
            "/tmp/a",
            "--add-dir",
            "/tmp/b",
            "--",
            "hello",
        ]
    );
}

#[rstest]
fn test_wrapper_and_extra_arguments() {
    let cli = ClaudeCodeCli::new(CliConfig {
        program: PathBuf::from("npx"),
        program_args: vec!["@anthropic-ai/claude-code".to_string()],
        allowed_tools: Vec::new(),
        extra_args: vec!["--debug".to_string()],
        ..CliConfig::default()
    });
    let args = args_of(&cli, &QueryOptions::default(), None);
    assert_eq!(args.first().map(String::as_str), Some("@anthropic-ai/claude-code"));
    assert_eq!(args[args.len() - 3..], ["--debug", "--", "hello"]);
    assert!(!args.iter().any(|a| a == "--allowedTools" || a == "--system-prompt"));
    let turns = args.iter().position(|a| a == "--max-turns").expect("max turns flag");
    assert_eq!(args[turns + 1], "1");
}

#[rstest]
#[case::list("- list three fruits")]
#[case::negative("-5°C, is that cold?")]
#[case::long_flag("--help me write a poem")]
fn test_prompt_starting_with_dash_follows_separator(#[case] prompt: &str) {
    let cli = ClaudeCodeCli::default();
    let args: Vec<String> = cli
        .build_command(prompt, &QueryOptions::default(), None)
        .as_std()
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    assert_eq!(args[args.len() - 2..], ["--", prompt]);
    assert_eq!(args.iter().filter(|a| *a == prompt).count(), 1);
}

#[rstest]
#[case::xml(ToolSyntax::Xml, "<functions>")]
#[case::bracket(ToolSyntax::Bracket, "Available tools:")]
fn test_tool_command_registers_tools(#[case] syntax: ToolSyntax, #[case] marker: &str) {
    let cli = ClaudeCodeCli::new(CliConfig {
        tool_syntax: syntax,
        ..CliConfig::default()
    });
    let options = QueryOptions {
        system_prompt: "Be brief.".to_string(),
        max_turns: 5,
        attachments: Vec::new(),
    };
    let args = args_of(&cli, &options, Some(&[get_location()]));

    let system = args
        .iter()
        .position(|a| a == "--system-prompt")
        .map(|i| args[i + 1].clone())
        .expect("system prompt flag");
    assert!(system.contains(marker));
    assert!(system.contains("get_location"));
    assert!(system.ends_with("Be brief."));

    let mode = args
        .iter()
        .position(|a| a == "--permission-mode")
        .map(|i| args[i + 1].clone());
    assert_eq!(mode.as_deref(), Some("bypassPermissions"));
}

#[cfg(unix)]
mod process {
    use super::get_location;
    use cc_bridge::{
        backend::{Backend, ClaudeCodeCli, QueryOptions, StreamChunk},
        config::{CliConfig, ToolSyntax},
        error::BackendError,
        models::Usage,
        tools::{BridgeOutcome, ToolBridge},
    };
    use futures_util::StreamExt;
    use serde_json::json;
    use std::{fs, path::PathBuf, time::Duration};
    use tempfile::TempDir;

    const INIT: &str = r#"{"type":"system","subtype":"init","session_id":"s1"}"#;
    const SUCCESS: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"Four.","num_turns":1,"usage":{"input_tokens":10,"output_tokens":3,"cache_read_input_tokens":5}}"#;

    fn assistant_text(text: &str) -> String {
        json!({"type": "assistant", "message": {"content": [{"type": "text", "text": text}]}})
            .to_string()
    }

    /// A fake `claude` that records its arguments and prints `lines`, then runs `tail`.
    fn fake_cli(dir: &TempDir, lines: &[String], tail: &str, syntax: ToolSyntax) -> ClaudeCodeCli {
        let output = dir.path().join("output.jsonl");
        fs::write(&output, lines.join("\n") + "\n").expect("write output");
        let script = dir.path().join("claude.sh");
        fs::write(
            &script,
            format!(
                "printf '%s\\n' \"$@\" > '{}'\ncat '{}'\n{tail}\n",
                dir.path().join("args.txt").display(),
                output.display()
            ),
        )
        .expect("write script");
        ClaudeCodeCli::new(CliConfig {
            program: PathBuf::from("sh"),
            program_args: vec![script.display().to_string()],
            tool_syntax: syntax,
            working_dir: Some(dir.path().to_path_buf()),
            ..CliConfig::default()
        })
    }

    fn options() -> QueryOptions {
        QueryOptions {
            system_prompt: "Be brief.".to_string(),
            max_turns: 1,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_simple_query_reads_text_and_usage() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(
            &dir,
            &[INIT.to_string(), assistant_text("Four."), SUCCESS.to_string()],
            "",
            ToolSyntax::Xml,
        );
        let reply = cli.simple_query("What is 2+2?", &options()).await.expect("reply");
        assert_eq!(reply.text, "Four.");
        assert_eq!(
            reply.usage,
            Usage {
                input_tokens: 15,
                output_tokens: 3,
                requests: 1,
            }
        );

        let args = fs::read_to_string(dir.path().join("args.txt")).expect("args recorded");
        assert!(args.lines().any(|line| line == "What is 2+2?"));
    }

    #[tokio::test]
    async fn test_result_text_is_used_when_no_assistant_text() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(&dir, &[INIT.to_string(), SUCCESS.to_string()], "", ToolSyntax::Xml);
        let reply = cli.simple_query("q", &options()).await.expect("reply");
        assert_eq!(reply.text, "Four.");
    }

    #[tokio::test]
    async fn test_xml_tool_call_is_captured_and_the_run_stopped() {
        let dir = TempDir::new().expect("temp dir");
        let text = "I'll look that up.\n<function_calls>\n<invoke name=\"get_location\">\n<parameter name=\"city\">Paris</parameter>\n</invoke>\n</function_calls>";
        let cli = fake_cli(&dir, &[INIT.to_string(), assistant_text(text)], "sleep 30", ToolSyntax::Xml);

        let mut bridge = ToolBridge::new();
        bridge.register(vec![get_location()]);
        bridge.begin();
        let reply = tokio::time::timeout(
            Duration::from_secs(10),
            cli.tool_query("Where is Paris?", bridge.specs(), &options(), &bridge),
        )
        .await
        .expect("the run ends once the call is captured")
        .expect("reply");

        assert_eq!(reply.text, "I'll look that up.");
        let BridgeOutcome::ToolCalls(calls) = bridge.finish() else {
            panic!("a call should have been captured");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "get_location");
        assert_eq!(calls[0].arguments.get("city"), Some(&json!("Paris")));
    }

    #[tokio::test]
    async fn test_bracket_tool_calls_are_captured() {
        let dir = TempDir::new().expect("temp dir");
        let text = "Two cities.\n---TOOLS---\n[tool(get_location, city=\"\"\"Paris\"\"\")]\n[tool(get_location, city=\"Lyon\")]\n---END_TOOLS---";
        let cli = fake_cli(
            &dir,
            &[INIT.to_string(), assistant_text(text), SUCCESS.to_string()],
            "",
            ToolSyntax::Bracket,
        );

        let mut bridge = ToolBridge::new();
        bridge.register(vec![get_location()]);
        bridge.begin();
        cli.tool_query("q", bridge.specs(), &options(), &bridge)
            .await
            .expect("reply");

        let BridgeOutcome::ToolCalls(calls) = bridge.finish() else {
            panic!("calls should have been captured");
        };
        let cities: Vec<_> = calls.iter().map(|c| c.arguments["city"].clone()).collect();
        assert_eq!(cities, vec![json!("Paris"), json!("Lyon")]);
    }

    #[tokio::test]
    async fn test_native_tool_use_goes_through_the_hook() {
        let dir = TempDir::new().expect("temp dir");
        let tool_use = json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "tool_use", "id": "toolu_1", "name": "get_location", "input": {"city": "Paris"}}
            ]}
        })
        .to_string();
        let cli = fake_cli(&dir, &[INIT.to_string(), tool_use], "sleep 30", ToolSyntax::Xml);

        let mut bridge = ToolBridge::new();
        bridge.register(vec![get_location()]);
        bridge.begin();
        tokio::time::timeout(
            Duration::from_secs(10),
            cli.tool_query("q", bridge.specs(), &options(), &bridge),
        )
        .await
        .expect("the run ends once the call is captured")
        .expect("reply");

        assert!(matches!(bridge.finish(), BridgeOutcome::ToolCalls(calls) if calls.len() == 1));
    }

    #[tokio::test]
    async fn test_text_without_calls_leaves_bridge_empty() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(
            &dir,
            &[INIT.to_string(), assistant_text("Paris is in France."), SUCCESS.to_string()],
            "",
            ToolSyntax::Xml,
        );
        let mut bridge = ToolBridge::new();
        bridge.register(vec![get_location()]);
        bridge.begin();
        let reply = cli
            .tool_query("q", bridge.specs(), &options(), &bridge)
            .await
            .expect("reply");
        assert_eq!(reply.text, "Paris is in France.");
        assert_eq!(bridge.finish(), BridgeOutcome::Text);
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let dir = TempDir::new().expect("temp dir");
        let failure = r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#;
        let cli = fake_cli(&dir, &[INIT.to_string(), failure.to_string()], "", ToolSyntax::Xml);
        let error = cli.simple_query("q", &options()).await.expect_err("failure result");
        assert!(matches!(error, BackendError::Reported(ref m) if m == "error_max_turns"));
    }

    #[tokio::test]
    async fn test_exit_status_and_stderr() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(&dir, &[String::new()], "echo 'not logged in' >&2\nexit 3", ToolSyntax::Xml);
        let error = cli.simple_query("q", &options()).await.expect_err("process failed");
        match error {
            BackendError::Exited { stderr, .. } => assert_eq!(stderr.trim(), "not logged in"),
            other => panic!("expected an exit failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_unparsable_output() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(&dir, &["Error: not json".to_string()], "", ToolSyntax::Xml);
        let error = cli.simple_query("q", &options()).await.expect_err("bad output");
        assert!(matches!(error, BackendError::SerdeJson(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let cli = ClaudeCodeCli::new(CliConfig {
            program: PathBuf::from("/nonexistent/claude"),
            ..CliConfig::default()
        });
        let error = cli.simple_query("q", &options()).await.expect_err("no such program");
        assert!(matches!(error, BackendError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_stream_query_yields_deltas_then_usage() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(
            &dir,
            &[
                INIT.to_string(),
                assistant_text("Fo"),
                assistant_text("ur."),
                SUCCESS.to_string(),
            ],
            "",
            ToolSyntax::Xml,
        );
        let chunks: Vec<StreamChunk> = cli
            .stream_query("q".to_string(), options())
            .map(|chunk| chunk.expect("chunk"))
            .collect()
            .await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta("Fo".to_string()),
                StreamChunk::TextDelta("\nur.".to_string()),
                StreamChunk::Usage(Usage {
                    input_tokens: 15,
                    output_tokens: 3,
                    requests: 1,
                }),
            ]
        );
    }

    async fn streamed_text(cli: &ClaudeCodeCli) -> String {
        cli.stream_query("q".to_string(), options())
            .filter_map(|chunk| async move {
                match chunk.expect("chunk") {
                    StreamChunk::TextDelta(delta) => Some(delta),
                    StreamChunk::Usage(_) => None,
                }
            })
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    #[tokio::test]
    async fn test_streamed_text_matches_simple_query() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(
            &dir,
            &[
                INIT.to_string(),
                assistant_text("Let me read the file."),
                assistant_text("The image shows a cat."),
                SUCCESS.to_string(),
            ],
            "",
            ToolSyntax::Xml,
        );
        let reply = cli.simple_query("q", &options()).await.expect("reply");
        assert_eq!(reply.text, "Let me read the file.\nThe image shows a cat.");
        assert_eq!(streamed_text(&cli).await, reply.text);
    }

    #[tokio::test]
    async fn test_streamed_result_text_when_no_assistant_text() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(&dir, &[INIT.to_string(), SUCCESS.to_string()], "", ToolSyntax::Xml);
        assert_eq!(streamed_text(&cli).await, "Four.");
    }

    #[tokio::test]
    async fn test_dash_prompt_reaches_the_cli_after_separator() {
        let dir = TempDir::new().expect("temp dir");
        let cli = fake_cli(
            &dir,
            &[INIT.to_string(), assistant_text("Apple."), SUCCESS.to_string()],
            "",
            ToolSyntax::Xml,
        );
        cli.simple_query("- list three fruits", &options())
            .await
            .expect("reply");
        let args = fs::read_to_string(dir.path().join("args.txt")).expect("args recorded");
        let lines: Vec<&str> = args.lines().collect();
        assert_eq!(lines[lines.len() - 2..], ["--", "- list three fruits"]);
    }
}
