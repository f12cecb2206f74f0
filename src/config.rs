use std::{env, path::PathBuf};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_MODEL_NAME: &str = "claude-code";
/// Provider identity reported to the framework, independent of the configured model name.
pub const PROVIDER_NAME: &str = "claude-code";

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub model_name: String,
    /// Directory attachment files are written to. Created once when the model is built.
    pub workspace_dir: PathBuf,
    pub text_max_turns: u32,
    pub attachment_max_turns: u32,
    pub tool_max_turns: u32,
    pub default_system_prompt: String,
    pub keep_attachments: bool,
    /// Installs the system prompt fallback and tool cleanup adapters.
    pub default_adapters: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            workspace_dir: env::temp_dir().join("cc-bridge"),
            text_max_turns: 1,
            attachment_max_turns: 3,
            tool_max_turns: 5,
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            keep_attachments: false,
            default_adapters: true,
        }
    }
}

impl AdapterConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_name: env::var("CC_BRIDGE_MODEL_NAME").unwrap_or(defaults.model_name),
            workspace_dir: env::var("CC_BRIDGE_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_dir),
            text_max_turns: env_number("CC_BRIDGE_TEXT_TURNS", defaults.text_max_turns),
            attachment_max_turns: env_number(
                "CC_BRIDGE_ATTACHMENT_TURNS",
                defaults.attachment_max_turns,
            ),
            tool_max_turns: env_number("CC_BRIDGE_TOOL_TURNS", defaults.tool_max_turns),
            default_system_prompt: env::var("CC_BRIDGE_SYSTEM_PROMPT")
                .unwrap_or(defaults.default_system_prompt),
            keep_attachments: env_flag("CC_BRIDGE_KEEP_ATTACHMENTS"),
            default_adapters: !env_flag("DISABLE_DEFAULT_ADAPTERS"),
        }
    }

    #[must_use]
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolSyntax {
    #[default]
    Xml,
    Bracket,
}

impl ToolSyntax {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "xml" => Some(Self::Xml),
            "bracket" => Some(Self::Bracket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub program: PathBuf,
    /// Arguments placed before the generated ones, for launchers such as `npx`.
    pub program_args: Vec<String>,
    pub model: Option<String>,
    pub permission_mode: String,
    pub allowed_tools: Vec<String>,
    pub tool_syntax: ToolSyntax,
    pub working_dir: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("claude"),
            program_args: Vec::new(),
            model: None,
            permission_mode: "acceptEdits".to_string(),
            allowed_tools: vec!["Read".to_string(), "Write".to_string()],
            tool_syntax: ToolSyntax::Xml,
            working_dir: None,
            extra_args: Vec::new(),
        }
    }
}

impl CliConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            program: env::var("CLAUDE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.program),
            model: env::var("CLAUDE_MODEL").ok().filter(|m| !m.is_empty()),
            permission_mode: env::var("CLAUDE_PERMISSION_MODE")
                .unwrap_or(defaults.permission_mode),
            tool_syntax: env::var("CC_BRIDGE_TOOL_SYNTAX")
                .ok()
                .and_then(|s| ToolSyntax::from_name(&s))
                .unwrap_or_default(),
            ..defaults
        }
    }
}

fn env_number(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key).is_ok_and(|value| value == "1" || value == "true")
}
