use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::ScError;
use crate::parse;
use crate::plan::{self, ChangeSet};
use crate::recovery::RecoveryConfig;
use crate::sc::ScRunner;

/// Result of reconciling one service within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Observed state already matches the declaration.
    Unchanged,
    /// One update invocation ran with the rendered arguments.
    Applied(ChangeSet),
    /// Preview mode: the update that would have run; nothing was invoked.
    WouldApply(ChangeSet),
}

/// One reconciliation pass over the service-control manager.
///
/// Owns the pass-scoped memo of observed records: each service is queried at
/// most once, the cached record is write-once and never invalidated, and the
/// whole memo drops with the session. A failed or successful update never
/// touches the memo; the next pass re-queries.
pub struct Session<'a, R: ScRunner> {
    runner: &'a R,
    services: Option<Vec<String>>,
    observed: HashMap<String, RecoveryConfig>,
}

impl<'a, R: ScRunner> Session<'a, R> {
    /// Start a pass using `runner` for native invocations.
    pub fn new(runner: &'a R) -> Self {
        Session {
            runner,
            services: None,
            observed: HashMap::new(),
        }
    }

    /// Names of all services known to the control manager (`sc.exe query`),
    /// fetched once per pass.
    pub fn services(&mut self) -> Result<&[String], ScError> {
        if self.services.is_none() {
            let raw = self.runner.sc(&["query".to_string()])?;
            self.services = Some(parse::parse_service_names(&raw));
        }
        Ok(self.services.as_deref().unwrap_or_default())
    }

    /// Observed recovery record for `name` (`sc.exe qfailure`), queried at
    /// most once per pass.
    pub fn observed(&mut self, name: &str) -> Result<&RecoveryConfig, ScError> {
        if !self.observed.contains_key(name) {
            let record = self.query_record(name)?;
            self.observed.insert(name.to_string(), record);
        }
        Ok(&self.observed[name])
    }

    fn query_record(&self, name: &str) -> Result<RecoveryConfig, ScError> {
        let args = ["qfailure".to_string(), name.to_string()];
        match self.runner.sc(&args) {
            Ok(raw) => parse::parse_qfailure(name, &raw),
            // sc exits nonzero for unknown services; keep the sharper error.
            Err(ScError::Invocation { output, .. }) if parse::is_not_found(&output) => {
                Err(ScError::ServiceNotFound(name.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Reconcile one declared record against observed state.
    ///
    /// Logs each out-of-sync field, then sends the single atomic update — or,
    /// when `noop` is true, only describes it. At most one update invocation
    /// per service per pass, by construction of the reset/actions coupling.
    pub fn reconcile(
        &mut self,
        desired: &RecoveryConfig,
        noop: bool,
    ) -> Result<Outcome, ScError> {
        let set = plan::diff(self.observed(&desired.name)?, desired);
        if set.is_empty() {
            debug!("{}: in sync", desired.name);
            return Ok(Outcome::Unchanged);
        }
        for field in &set.changed {
            info!("{}: {field} changed", desired.name);
        }
        if noop {
            info!("{}: {}", desired.name, set.preview(&desired.name));
            return Ok(Outcome::WouldApply(set));
        }
        self.runner.sc(&set.invocation(&desired.name))?;
        info!("{}: updated", desired.name);
        Ok(Outcome::Applied(set))
    }

    /// Reconcile every declared record, isolating failures: one service
    /// erroring never stops the pass.
    pub fn reconcile_all(
        &mut self,
        desired: &[RecoveryConfig],
        noop: bool,
    ) -> Vec<(String, Result<Outcome, ScError>)> {
        desired
            .iter()
            .map(|record| {
                let result = self.reconcile(record, noop);
                if let Err(err) = &result {
                    warn!("{}: {err}", record.name);
                }
                (record.name.clone(), result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::{ActionKind, FailureAction};
    use std::cell::RefCell;

    const SPOOLER_QFAILURE: &str = concat!(
        "[SC] QueryServiceConfig2 SUCCESS\r\n",
        "\r\n",
        "SERVICE_NAME: spooler\r\n",
        "        RESET_PERIOD (in seconds)    : 86400\r\n",
        "        REBOOT_MESSAGE               : Spooler failed\r\n",
        "        COMMAND_LINE                 : a.exe\r\n",
        "        FAILURE_ACTIONS              : RESTART -- Delay = 60000 milliseconds.\r\n",
    );

    /// Test double standing in for sc.exe: canned output per verb, every
    /// invocation recorded in order.
    #[derive(Default)]
    struct MockSc {
        query: String,
        qfailure: HashMap<String, String>,
        fail_update: bool,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl MockSc {
        fn with_service(name: &str, report: &str) -> Self {
            let mut mock = MockSc::default();
            mock.qfailure.insert(name.to_string(), report.to_string());
            mock
        }

        fn calls_of(&self, verb: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|args| args[0] == verb)
                .count()
        }
    }

    impl ScRunner for MockSc {
        fn sc(&self, args: &[String]) -> Result<String, ScError> {
            self.calls.borrow_mut().push(args.to_vec());
            match args[0].as_str() {
                "query" => Ok(self.query.clone()),
                "qfailure" => self.qfailure.get(&args[1]).cloned().ok_or_else(|| {
                    ScError::Invocation {
                        verb: "qfailure".into(),
                        status: "exit code: 1060".into(),
                        output: "[SC] OpenService FAILED 1060:".into(),
                    }
                }),
                "failure" if self.fail_update => Err(ScError::Invocation {
                    verb: "failure".into(),
                    status: "exit code: 5".into(),
                    output: "Access is denied.".into(),
                }),
                "failure" => Ok("[SC] ChangeServiceConfig2 SUCCESS".into()),
                other => panic!("unexpected sc verb {other}"),
            }
        }
    }

    fn spooler_as_observed() -> RecoveryConfig {
        RecoveryConfig {
            reset_period: Some(86_400),
            reboot_message: Some("Spooler failed".into()),
            command: Some("a.exe".into()),
            failure_actions: Some(vec![FailureAction {
                kind: ActionKind::Restart,
                delay_ms: 60_000,
            }]),
            ..RecoveryConfig::new("spooler")
        }
    }

    #[test]
    fn observed_is_queried_once_per_pass() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let first = session.observed("spooler").unwrap().clone();
        let second = session.observed("spooler").unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(mock.calls_of("qfailure"), 1);
    }

    #[test]
    fn repeated_reconciles_share_the_memoized_record() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let mut desired = RecoveryConfig::new("spooler");
        desired.command = Some("b.exe".into());
        session.reconcile(&desired, true).unwrap();
        session.reconcile(&desired, true).unwrap();
        assert_eq!(mock.calls_of("qfailure"), 1);
    }

    #[test]
    fn in_sync_record_is_unchanged_without_invocation() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let outcome = session.reconcile(&spooler_as_observed(), false).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(mock.calls_of("failure"), 0);
    }

    #[test]
    fn out_of_sync_record_applies_one_update() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let mut desired = spooler_as_observed();
        desired.command = Some("b.exe".into());
        match session.reconcile(&desired, false).unwrap() {
            Outcome::Applied(set) => {
                assert_eq!(set.args, vec![r#"command="b.exe""#.to_string()])
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        assert_eq!(mock.calls_of("failure"), 1);
        let calls = mock.calls.borrow();
        let update = calls.iter().find(|args| args[0] == "failure").unwrap();
        assert_eq!(
            update.as_slice(),
            ["failure", "spooler", r#"command="b.exe""#]
        );
    }

    #[test]
    fn noop_mode_previews_without_invoking() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let mut desired = spooler_as_observed();
        desired.reset_period = Some(3_600);
        match session.reconcile(&desired, true).unwrap() {
            Outcome::WouldApply(set) => assert_eq!(
                set.preview("spooler"),
                "would have run: sc.exe failure spooler reset=3600 actions=restart/60000/"
            ),
            other => panic!("expected WouldApply, got {other:?}"),
        }
        assert_eq!(mock.calls_of("failure"), 0);
    }

    #[test]
    fn missing_service_surfaces_not_found() {
        let mock = MockSc::default();
        let mut session = Session::new(&mock);
        match session.reconcile(&RecoveryConfig::new("ghost"), false) {
            Err(ScError::ServiceNotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected ServiceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn failed_update_keeps_the_memo_intact() {
        let mut mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        mock.fail_update = true;
        let mut session = Session::new(&mock);
        let mut desired = spooler_as_observed();
        desired.command = Some("b.exe".into());
        match session.reconcile(&desired, false) {
            Err(ScError::Invocation { output, .. }) => {
                assert!(output.contains("Access is denied"))
            }
            other => panic!("expected Invocation, got {other:?}"),
        }
        // Observed state is still the pre-attempt record, not re-queried.
        let observed = session.observed("spooler").unwrap();
        assert_eq!(observed.command.as_deref(), Some("a.exe"));
        assert_eq!(mock.calls_of("qfailure"), 1);
    }

    #[test]
    fn pass_continues_after_a_failure() {
        let mock = MockSc::with_service("spooler", SPOOLER_QFAILURE);
        let mut session = Session::new(&mock);
        let mut desired_spooler = spooler_as_observed();
        desired_spooler.command = Some("b.exe".into());
        let declared = vec![RecoveryConfig::new("ghost"), desired_spooler];
        let results = session.reconcile_all(&declared, false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "ghost");
        assert!(matches!(results[0].1, Err(ScError::ServiceNotFound(_))));
        assert!(matches!(results[1].1, Ok(Outcome::Applied(_))));
    }

    #[test]
    fn service_names_are_listed_once() {
        let mut mock = MockSc::default();
        mock.query = concat!(
            "SERVICE_NAME: Dnscache\r\n",
            "SERVICE_NAME: Spooler\r\n",
        )
        .to_string();
        let mut session = Session::new(&mock);
        assert_eq!(session.services().unwrap(), ["Dnscache", "Spooler"]);
        assert_eq!(session.services().unwrap().len(), 2);
        assert_eq!(mock.calls_of("query"), 1);
    }
}
