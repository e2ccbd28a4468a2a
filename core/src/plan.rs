use std::fmt;

use crate::recovery::{FailureAction, RecoveryConfig};

/// Reset period sc.exe assumes when none was ever configured, in seconds
/// (one day).
pub const DEFAULT_RESET_PERIOD: u32 = 86_400;

/// Record fields the differ can find out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `reboot_message` differs.
    RebootMessage,
    /// `command` differs.
    Command,
    /// `reset_period` differs.
    ResetPeriod,
    /// `failure_actions` differs.
    FailureActions,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::RebootMessage => "reboot_message",
            Field::Command => "command",
            Field::ResetPeriod => "reset_period",
            Field::FailureActions => "failure_actions",
        })
    }
}

/// Result of diffing one observed record against its declaration: the
/// rendered `sc.exe failure` argument tokens plus the fields that differed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// Rendered tokens in their stable emission order: reboot, command,
    /// reset, actions.
    pub args: Vec<String>,
    /// Fields that actually differed. `args` can carry both `reset=` and
    /// `actions=` with only one of the pair listed here.
    pub changed: Vec<Field>,
}

impl ChangeSet {
    /// True when observed state already matches the declaration.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Full positional argument list for the update invocation:
    /// `failure <service> <tokens...>`. Tokens stay discrete argv elements;
    /// they are never joined into a shell string.
    pub fn invocation(&self, service: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        args.push("failure".to_string());
        args.push(service.to_string());
        args.extend(self.args.iter().cloned());
        args
    }

    /// One-line description of the update, for preview mode.
    pub fn preview(&self, service: &str) -> String {
        format!(
            "would have run: sc.exe failure {} {}",
            service,
            self.args.join(" ")
        )
    }
}

/// Compare an observed record with a desired one and render the update.
///
/// Absence in desired means "leave unspecified", never "clear".
/// `reboot_message` and `command` compare independently by exact string
/// equality. `reset_period` and `failure_actions` are coupled: sc.exe
/// rewrites the pair atomically with no partial-update mode, so when either
/// differs both tokens are emitted, the unspecified half falling back to its
/// observed value and then to the Windows defaults (reset 86400, no actions).
///
/// Desired input is assumed validated upstream; kinds and lengths are not
/// coerced here. Values land verbatim inside the quotes of `reboot="..."`
/// and `command="..."`; embedded quote characters are a known gap.
pub fn diff(observed: &RecoveryConfig, desired: &RecoveryConfig) -> ChangeSet {
    let mut set = ChangeSet::default();

    if let Some(message) = &desired.reboot_message {
        if observed.reboot_message.as_ref() != Some(message) {
            set.changed.push(Field::RebootMessage);
            set.args.push(format!("reboot=\"{message}\""));
        }
    }
    if let Some(command) = &desired.command {
        if observed.command.as_ref() != Some(command) {
            set.changed.push(Field::Command);
            set.args.push(format!("command=\"{command}\""));
        }
    }

    let reset_changed =
        desired.reset_period.is_some() && observed.reset_period != desired.reset_period;
    let actions_changed = desired.failure_actions.is_some()
        && observed.failure_actions != desired.failure_actions;
    if reset_changed {
        set.changed.push(Field::ResetPeriod);
    }
    if actions_changed {
        set.changed.push(Field::FailureActions);
    }
    if reset_changed || actions_changed {
        let reset = desired
            .reset_period
            .or(observed.reset_period)
            .unwrap_or(DEFAULT_RESET_PERIOD);
        set.args.push(format!("reset={reset}"));

        let actions = desired
            .failure_actions
            .as_deref()
            .or(observed.failure_actions.as_deref())
            .unwrap_or(&[]);
        set.args.push(render_actions(actions));
    }

    set
}

/// Render the `actions=` token: one `<kind-token>/<delay>/` segment per slot,
/// in declared order. A noop slot contributes an empty kind, so two adjacent
/// slashes keep its position.
pub fn render_actions(actions: &[FailureAction]) -> String {
    let mut arg = String::from("actions=");
    for action in actions {
        arg.push_str(action.kind.sc_token());
        arg.push('/');
        arg.push_str(&action.delay_ms.to_string());
        arg.push('/');
    }
    arg
}
