//! Dispatch targets: which backend a call goes to and what it carries.

use super::reasoning::ReasoningConfig;
use super::tool::ToolChoice;
use serde::Deserialize;
use serde_json::Value;

/// Parameters for the primary ("responses") backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrimaryParams {
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    /// Ordered conversation items, forwarded verbatim.
    #[serde(default)]
    pub input: Vec<Value>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient_tool_choice")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub reasoning: Option<ReasoningConfig>,
}

fn lenient_tool_choice<'de, D>(d: D) -> Result<Option<ToolChoice>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.map(|v| ToolChoice::from_value(&v)))
}

impl PrimaryParams {
    pub fn new(model: impl Into<String>, input: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            instructions: None,
            input,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            reasoning: None,
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Validate a raw caller value into a tool choice (unknown shapes become `auto`).
    pub fn tool_choice_value(mut self, raw: &Value) -> Self {
        self.tool_choice = Some(ToolChoice::from_value(raw));
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = Some(reasoning);
        self
    }
}

/// Parameters for the alternate (local model) backend: a path under the configured
/// base URL and a pre-built payload sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateParams {
    pub path: String,
    pub payload: Value,
}

impl AlternateParams {
    pub fn new(path: impl Into<String>, payload: Value) -> Self {
        Self {
            path: path.into(),
            payload,
        }
    }
}

/// Exactly one backend per call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchTarget {
    Primary(PrimaryParams),
    Alternate(AlternateParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Primary,
    Alternate,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Primary => "primary",
            TargetKind::Alternate => "alternate",
        }
    }
}

impl DispatchTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            DispatchTarget::Primary(_) => TargetKind::Primary,
            DispatchTarget::Alternate(_) => TargetKind::Alternate,
        }
    }
}

impl From<PrimaryParams> for DispatchTarget {
    fn from(params: PrimaryParams) -> Self {
        DispatchTarget::Primary(params)
    }
}

impl From<AlternateParams> for DispatchTarget {
    fn from(params: AlternateParams) -> Self {
        DispatchTarget::Alternate(params)
    }
}
