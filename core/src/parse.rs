use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScError;
use crate::recovery::{ActionKind, FailureAction, RecoveryConfig};

/// Marker sc.exe prints when the target service does not exist
/// (`[SC] OpenService FAILED 1060: ...`).
const NOT_FOUND_MARKER: &str = "OpenService FAILED";

static SERVICE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SERVICE_NAME: (.*)").expect("service name pattern"));
static RESET_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RESET_PERIOD \(in seconds\)\s*:\s*(.*)").expect("reset period pattern")
});
static REBOOT_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"REBOOT_MESSAGE\s*:\s*(.*)").expect("reboot message pattern"));
static COMMAND_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"COMMAND_LINE\s*:\s*(.*)").expect("command line pattern"));
static RESTART_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RESTART -- Delay = (\d+) milliseconds").expect("restart action pattern")
});
static RUN_PROCESS_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RUN PROCESS -- Delay = (\d+) milliseconds").expect("run process action pattern")
});
static REBOOT_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"REBOOT -- Delay = (\d+) milliseconds").expect("reboot action pattern")
});

/// Whether raw sc output carries the open-service failure sentinel.
pub fn is_not_found(raw: &str) -> bool {
    raw.contains(NOT_FOUND_MARKER)
}

/// Parse the report printed by `sc.exe qfailure <service>`.
///
/// Scans lines once, in order, trying patterns per line in a fixed priority:
/// reset period, reboot message, command line, then the three action forms.
/// The first match for each label field is authoritative and later duplicates
/// are ignored; action lines are never deduplicated — every match appends,
/// since a report can legitimately carry up to three actions of one kind.
/// The first action usually rides on the `FAILURE_ACTIONS` label line itself,
/// so action patterns match anywhere in a line. Unmatched lines are ignored.
pub fn parse_qfailure(service: &str, raw: &str) -> Result<RecoveryConfig, ScError> {
    if is_not_found(raw) {
        return Err(ScError::ServiceNotFound(service.to_string()));
    }

    let mut record = RecoveryConfig::new(service);
    let mut actions = Vec::new();
    // Blank label values still claim the first match for their field.
    let mut seen_reboot_message = false;
    let mut seen_command = false;

    for line in raw.lines() {
        if record.reset_period.is_none() {
            if let Some(caps) = RESET_PERIOD.captures(line) {
                record.reset_period = Some(parse_number("reset_period", &caps[1])?);
                continue;
            }
        }
        if !seen_reboot_message {
            if let Some(caps) = REBOOT_MESSAGE.captures(line) {
                seen_reboot_message = true;
                record.reboot_message = nonempty(&caps[1]);
                continue;
            }
        }
        if !seen_command {
            if let Some(caps) = COMMAND_LINE.captures(line) {
                seen_command = true;
                record.command = nonempty(&caps[1]);
                continue;
            }
        }
        if let Some(caps) = RESTART_ACTION.captures(line) {
            actions.push(FailureAction {
                kind: ActionKind::Restart,
                delay_ms: parse_number("restart delay", &caps[1])?,
            });
            continue;
        }
        if let Some(caps) = RUN_PROCESS_ACTION.captures(line) {
            actions.push(FailureAction {
                kind: ActionKind::RunCommand,
                delay_ms: parse_number("run process delay", &caps[1])?,
            });
            continue;
        }
        if let Some(caps) = REBOOT_ACTION.captures(line) {
            actions.push(FailureAction {
                kind: ActionKind::Reboot,
                delay_ms: parse_number("reboot delay", &caps[1])?,
            });
        }
    }

    record.failure_actions = Some(actions);
    Ok(record)
}

/// Parse `sc.exe query` output into the service names it enumerates.
pub fn parse_service_names(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| SERVICE_NAME.captures(line))
        .filter_map(|caps| nonempty(&caps[1]))
        .collect()
}

/// First `SERVICE_NAME:` line of a capture, if any. Used to name records
/// parsed from captured output.
pub fn service_name_of(raw: &str) -> Option<String> {
    raw.lines()
        .find_map(|line| SERVICE_NAME.captures(line).and_then(|caps| nonempty(&caps[1])))
}

/// Trimmed capture text, with blank report values mapped to "unset".
fn nonempty(capture: &str) -> Option<String> {
    let trimmed = capture.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_number(field: &'static str, capture: &str) -> Result<u32, ScError> {
    let text = capture.trim();
    text.parse::<u32>().map_err(|_| ScError::Malformed {
        field,
        value: text.to_string(),
    })
}
