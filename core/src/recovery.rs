use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of recovery action the service-control facility can register for a
/// failure slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Reserve the slot without registering an action.
    ///
    /// qfailure does not report empty slots back, so a declared noop slot is
    /// re-sent on every pass (idempotency loss inherited from the facility).
    Noop,
    /// Restart the service.
    Restart,
    /// Reboot the machine, showing the configured reboot message first.
    Reboot,
    /// Run the configured command line.
    RunCommand,
}

impl ActionKind {
    /// Token used for this kind in the `actions=` argument of
    /// `sc.exe failure`. A noop renders as an empty segment.
    pub fn sc_token(self) -> &'static str {
        match self {
            ActionKind::Noop => "",
            ActionKind::Restart => "restart",
            ActionKind::Reboot => "reboot",
            ActionKind::RunCommand => "run",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Noop => "noop",
            ActionKind::Restart => "restart",
            ActionKind::Reboot => "reboot",
            ActionKind::RunCommand => "run_command",
        })
    }
}

/// One failure-action slot: what to do and how long to wait first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureAction {
    /// Action kind.
    pub kind: ActionKind,
    /// Delay before the action fires, in milliseconds (1000 if undeclared).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u32,
}

fn default_delay_ms() -> u32 {
    1_000
}

/// Recovery settings for one Windows service.
///
/// The same record describes observed state (parsed from a qfailure report)
/// and desired state (declared in a manifest). An unset field means
/// "not observed" on one side and "leave unspecified" on the other; there is
/// no way to clear a field through this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Service name; the record's identity.
    pub name: String,
    /// Seconds after which the service's failure counter resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_period: Option<u32>,
    /// Message displayed before a reboot action fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_message: Option<String>,
    /// Command line run by a run_command action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Ordered failure actions; the facility accepts at most 3 slots.
    /// `Some(vec![])` is "observed/declared empty", `None` is "unspecified".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_actions: Option<Vec<FailureAction>>,
}

impl RecoveryConfig {
    /// Empty record for `name`; fields are filled by the parser or manifest.
    pub fn new(name: impl Into<String>) -> Self {
        RecoveryConfig {
            name: name.into(),
            reset_period: None,
            reboot_message: None,
            command: None,
            failure_actions: None,
        }
    }
}

impl fmt::Display for RecoveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "service {}", self.name)?;
        if let Some(reset) = self.reset_period {
            writeln!(f, "  reset_period   : {reset}")?;
        }
        if let Some(message) = &self.reboot_message {
            writeln!(f, "  reboot_message : {message}")?;
        }
        if let Some(command) = &self.command {
            writeln!(f, "  command        : {command}")?;
        }
        if let Some(actions) = &self.failure_actions {
            if actions.is_empty() {
                writeln!(f, "  actions        : (none)")?;
            }
            for (slot, action) in actions.iter().enumerate() {
                writeln!(
                    f,
                    "  action[{slot}]      : {} after {}ms",
                    action.kind, action.delay_ms
                )?;
            }
        }
        Ok(())
    }
}
