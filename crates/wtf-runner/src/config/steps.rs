use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use wtf_wait::Locator;

/// The element a step works on: a locator, optionally below a parent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Target {
    /// `strategy:value`, e.g. `class:button1`.
    pub locator: String,
    /// Resolve `locator` below the first element matching this one.
    pub within: Option<String>,
}

impl Target {
    pub fn locator(&self) -> Locator {
        Locator::parse(&self.locator)
    }

    pub fn parent(&self) -> Option<Locator> {
        self.within.as_deref().map(Locator::parse)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.within {
            Some(ref parent) => write!(f, "'{}' within '{}'", self.locator, parent),
            None => write!(f, "'{}'", self.locator),
        }
    }
}

/// Per-step override of the scenario's wait settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WaitOverride {
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

/// What a check step is expected to observe.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    #[default]
    Success,
    Timeout,
    Fatal,
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Expect::Success => "success",
            Expect::Timeout => "timeout",
            Expect::Fatal => "fatal error",
        })
    }
}

/// One step of a scenario.
#[derive(Debug, Clone)]
pub enum Step {
    // Checks
    Present(CheckStep),
    Visible(CheckStep),
    Invisible(CheckStep),
    Clickable(CheckStep),
    Selected(CheckStep),
    NotSelected(CheckStep),
    TextContains(TextCheckStep),
    TextAbsent(TextCheckStep),
    AttributeContains(AttributeCheckStep),
    AllPresent(AllPresentStep),

    // Interaction
    Click(TargetStep),
    Type(TypeStep),
    Clear(TargetStep),
    Select(SelectStep),

    // Page
    Reload,
    Sleep(SleepStep),

    // Debug
    Log(LogStep),
    AssertText(AssertTextStep),

    // Control flow
    Repeat(RepeatStep),

    // Composition
    Include(IncludeStep),
}

impl Step {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Present(_) => "present",
            Self::Visible(_) => "visible",
            Self::Invisible(_) => "invisible",
            Self::Clickable(_) => "clickable",
            Self::Selected(_) => "selected",
            Self::NotSelected(_) => "not_selected",
            Self::TextContains(_) => "text_contains",
            Self::TextAbsent(_) => "text_absent",
            Self::AttributeContains(_) => "attribute_contains",
            Self::AllPresent(_) => "all_present",
            Self::Click(_) => "click",
            Self::Type(_) => "type",
            Self::Clear(_) => "clear",
            Self::Select(_) => "select",
            Self::Reload => "reload",
            Self::Sleep(_) => "sleep",
            Self::Log(_) => "log",
            Self::AssertText(_) => "assert_text",
            Self::Repeat(_) => "repeat",
            Self::Include(_) => "include",
        }
    }

    /// The wait override carried by the step, if it has one.
    pub fn wait(&self) -> Option<&WaitOverride> {
        match self {
            Self::Present(s)
            | Self::Visible(s)
            | Self::Invisible(s)
            | Self::Clickable(s)
            | Self::Selected(s)
            | Self::NotSelected(s) => Some(&s.wait),
            Self::TextContains(s) | Self::TextAbsent(s) => Some(&s.wait),
            Self::AttributeContains(s) => Some(&s.wait),
            Self::AllPresent(s) => Some(&s.wait),
            Self::Click(s) | Self::Clear(s) => Some(&s.wait),
            Self::Type(s) => Some(&s.wait),
            Self::Select(s) => Some(&s.wait),
            Self::AssertText(s) => Some(&s.wait),
            Self::Reload
            | Self::Sleep(_)
            | Self::Log(_)
            | Self::Repeat(_)
            | Self::Include(_) => None,
        }
    }
}

const STEP_NAMES: &[&str] = &[
    "present",
    "visible",
    "invisible",
    "clickable",
    "selected",
    "not_selected",
    "text_contains",
    "text_absent",
    "attribute_contains",
    "all_present",
    "click",
    "type",
    "clear",
    "select",
    "reload",
    "sleep",
    "log",
    "assert_text",
    "repeat",
    "include",
];

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StepVisitor)
    }
}

struct StepVisitor;

impl<'de> Visitor<'de> for StepVisitor {
    type Value = Step;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a step (string for unit variants, or map with single key)")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "reload" => Ok(Step::Reload),
            other => Err(de::Error::unknown_variant(other, &["reload"])),
        }
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected step type key"))?;

        let step = match key.as_str() {
            "present" => Step::Present(map.next_value()?),
            "visible" => Step::Visible(map.next_value()?),
            "invisible" => Step::Invisible(map.next_value()?),
            "clickable" => Step::Clickable(map.next_value()?),
            "selected" => Step::Selected(map.next_value()?),
            "not_selected" => Step::NotSelected(map.next_value()?),
            "text_contains" => Step::TextContains(map.next_value()?),
            "text_absent" => Step::TextAbsent(map.next_value()?),
            "attribute_contains" => Step::AttributeContains(map.next_value()?),
            "all_present" => Step::AllPresent(map.next_value()?),
            "click" => Step::Click(map.next_value()?),
            "type" => Step::Type(map.next_value()?),
            "clear" => Step::Clear(map.next_value()?),
            "select" => Step::Select(map.next_value()?),
            "reload" => {
                let _: serde_yaml::Value = map.next_value()?;
                Step::Reload
            }
            "sleep" => Step::Sleep(map.next_value()?),
            "log" => Step::Log(map.next_value()?),
            "assert_text" => Step::AssertText(map.next_value()?),
            "repeat" => Step::Repeat(map.next_value()?),
            "include" => Step::Include(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, STEP_NAMES)),
        };

        Ok(step)
    }
}

// --- Step payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct CheckStep {
    #[serde(flatten)]
    pub target: Target,
    #[serde(flatten)]
    pub wait: WaitOverride,
    #[serde(default)]
    pub expect: Expect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextCheckStep {
    #[serde(flatten)]
    pub target: Target,
    pub text: String,
    #[serde(flatten)]
    pub wait: WaitOverride,
    #[serde(default)]
    pub expect: Expect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeCheckStep {
    #[serde(flatten)]
    pub target: Target,
    pub attribute: String,
    pub value: String,
    #[serde(flatten)]
    pub wait: WaitOverride,
    #[serde(default)]
    pub expect: Expect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllPresentStep {
    #[serde(flatten)]
    pub target: Target,
    /// Exact number of matches required on success.
    pub count: Option<usize>,
    #[serde(flatten)]
    pub wait: WaitOverride,
    #[serde(default)]
    pub expect: Expect,
}

/// Step that just needs a target element.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetStep {
    #[serde(flatten)]
    pub target: Target,
    #[serde(flatten)]
    pub wait: WaitOverride,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeStep {
    #[serde(flatten)]
    pub target: Target,
    pub value: String,
    #[serde(flatten)]
    pub wait: WaitOverride,
}

/// Pick an option of a `<select>`: by exact text, by index, or at random.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectStep {
    #[serde(flatten)]
    pub target: Target,
    pub text: Option<String>,
    pub index: Option<usize>,
    #[serde(default)]
    pub random: bool,
    #[serde(flatten)]
    pub wait: WaitOverride,
}

impl SelectStep {
    pub(crate) fn choices(&self) -> usize {
        self.text.is_some() as usize + self.index.is_some() as usize + self.random as usize
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepStep {
    pub ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogStep {
    pub message: String,
}

/// Read the element's text once it is present and require `text` in it.
#[derive(Debug, Clone, Deserialize)]
pub struct AssertTextStep {
    #[serde(flatten)]
    pub target: Target,
    pub text: String,
    #[serde(flatten)]
    pub wait: WaitOverride,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepeatStep {
    pub times: u32,
    pub steps: Vec<Step>,
}

/// Include another scenario's steps.
#[derive(Debug, Clone, Deserialize)]
pub struct IncludeStep {
    /// Path to the scenario file to include.
    pub path: String,

    /// Parameters to pass to the included scenario.
    #[serde(default)]
    pub params: std::collections::HashMap<String, String>,
}
