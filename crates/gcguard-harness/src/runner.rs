//! Self-check runner: drives the guard through every decision path in-process
//! and logs one structured record per scenario.
//!
//! Scenarios use the real registry, the pipe probe and the allow-list; only
//! the thread-state and TLS-teardown answers are scripted, since those come
//! from the managed runtime.

use std::cell::Cell;
use std::sync::{Arc, Barrier};
use std::time::Instant;

use gcguard_abi::guard::{NIL_MESSAGE_SENDER, TLS_TEARDOWN_QUERY_SYMBOL};
use gcguard_abi::platform::{current_thread_identity, is_main_thread};
use gcguard_abi::{
    Acceptance, CallSite, GuardEnvironment, GuardError, PipeProbe, ThreadContext, check_call,
};
use gcguard_core::{RegistryError, ThreadRegistry, ThreadState};
use gcguard_membrane::MANAGED_PREFIX_MAGIC;
use gcguard_membrane::config::CheckMode;
use gcguard_membrane::metrics::{MetricsSnapshot, global_metrics};
use serde::Serialize;
use thiserror::Error;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

thread_local! {
    static CONTEXT: ThreadContext<PipeProbe> = const { ThreadContext::new() };
}

/// Marker word followed by a fake entry point.
static MANAGED_FUNCTION: [u64; 2] = [MANAGED_PREFIX_MAGIC, 0];
static FOREIGN_FUNCTION: [u64; 2] = [0, 0];

const WALK_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("log output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{failed} of {total} self-check scenarios failed")]
    Failed { failed: usize, total: usize },
}

/// What a scenario expects from the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Accept(Acceptance),
    Violation,
    ProbeFailure,
}

/// One guard scenario.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub caller: &'static str,
    pub callee: Option<&'static str>,
    pub callee_ptr: fn() -> usize,
    pub registered: bool,
    pub state: ThreadState,
    pub teardown: bool,
    /// Re-enter the guard from inside the state query.
    pub reenter: bool,
    pub expect: Expect,
}

fn managed_entry() -> usize {
    std::ptr::addr_of!(MANAGED_FUNCTION[1]) as usize
}

fn foreign_entry() -> usize {
    std::ptr::addr_of!(FOREIGN_FUNCTION[1]) as usize
}

fn nil_sender() -> usize {
    NIL_MESSAGE_SENDER
}

const BASE: Scenario = Scenario {
    name: "",
    caller: "kfun:selfcheck",
    callee: None,
    callee_ptr: foreign_entry,
    registered: true,
    state: ThreadState::Runnable,
    teardown: false,
    reenter: false,
    expect: Expect::Violation,
};

/// The built-in scenario suite, one per guard exit.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "nil_message_send",
            callee_ptr: nil_sender,
            expect: Expect::Accept(Acceptance::NilMessageSend),
            ..BASE
        },
        Scenario {
            name: "teardown_query_caller",
            caller: TLS_TEARDOWN_QUERY_SYMBOL,
            expect: Expect::Accept(Acceptance::TeardownQuery),
            ..BASE
        },
        Scenario {
            name: "thread_local_teardown",
            teardown: true,
            expect: Expect::Accept(Acceptance::ThreadLocalTeardown),
            ..BASE
        },
        Scenario {
            name: "unregistered_thread",
            registered: false,
            expect: Expect::Accept(Acceptance::UnregisteredThread),
            ..BASE
        },
        Scenario {
            name: "native_state",
            state: ThreadState::Native,
            expect: Expect::Accept(Acceptance::NativeState),
            ..BASE
        },
        Scenario {
            name: "reentrant_call",
            state: ThreadState::Native,
            reenter: true,
            expect: Expect::Accept(Acceptance::NativeState),
            ..BASE
        },
        Scenario {
            name: "managed_prefix",
            callee_ptr: managed_entry,
            expect: Expect::Accept(Acceptance::ManagedPrefix),
            ..BASE
        },
        Scenario {
            name: "allow_listed_name",
            callee: Some("pthread_mutex_unlock"),
            expect: Expect::Accept(Acceptance::AllowListed),
            ..BASE
        },
        Scenario {
            name: "foreign_call_violation",
            callee: Some("launch_missiles"),
            ..BASE
        },
        Scenario {
            name: "unknown_callee_violation",
            ..BASE
        },
    ]
}

/// Environment with a real registry and scripted runtime answers.
struct ScenarioEnv<'a> {
    registry: &'a ThreadRegistry,
    scenario: &'a Scenario,
    nested: Cell<Option<Acceptance>>,
}

impl GuardEnvironment for ScenarioEnv<'_> {
    fn is_thread_local_teardown_running(&self) -> bool {
        self.scenario.teardown
    }

    fn is_current_thread_registered(&self) -> bool {
        self.registry.is_current_thread_registered()
    }

    fn thread_state(&self) -> ThreadState {
        if self.scenario.reenter && self.nested.get().is_none() {
            let site = CallSite {
                caller: "state_query",
                callee: Some("launch_missiles"),
                callee_ptr: foreign_entry(),
            };
            self.nested.set(check_call(self, &CONTEXT, &site).ok());
        }
        self.scenario.state
    }

    fn resolve_symbol(&self, addr: usize) -> Option<String> {
        gcguard_abi::platform::address_to_symbol(addr)
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub decision: String,
    pub passed: bool,
    pub latency_ns: u64,
}

/// Summary of a self-check run.
#[derive(Debug, Clone, Serialize)]
pub struct SelfCheckReport {
    pub run_id: String,
    pub mode: &'static str,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub registry_walk_ok: bool,
    pub results: Vec<ScenarioResult>,
    pub metrics: serde_json::Value,
}

impl SelfCheckReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.registry_walk_ok
    }
}

/// Runs the scenario suite and the registry walk check.
pub struct SelfCheckRunner {
    run_id: String,
    mode: CheckMode,
}

impl SelfCheckRunner {
    #[must_use]
    pub fn new(run_id: impl Into<String>, mode: CheckMode) -> Self {
        Self {
            run_id: run_id.into(),
            mode,
        }
    }

    pub fn run(&self, log: &mut LogEmitter) -> Result<SelfCheckReport, HarnessError> {
        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "self_check_start").with_mode(self.mode.as_str()),
        )?;

        let registry = ThreadRegistry::new();
        let node = registry.register_current_thread(current_thread_identity())?;
        let unregistered = ThreadRegistry::new();

        let mut results = Vec::new();
        for scenario in scenarios() {
            let reg = if scenario.registered {
                &registry
            } else {
                &unregistered
            };
            let result = self.run_scenario(reg, &scenario);
            let level = if result.passed {
                LogLevel::Info
            } else {
                LogLevel::Error
            };
            log.emit_entry(
                LogEntry::new("", level, "scenario")
                    .with_mode(self.mode.as_str())
                    .with_scenario(scenario.name)
                    .with_call(scenario.caller, scenario.callee.map(str::to_owned))
                    .with_decision(result.decision.clone())
                    .with_outcome(if result.passed {
                        Outcome::Pass
                    } else {
                        Outcome::Fail
                    })
                    .with_latency_ns(result.latency_ns),
            )?;
            results.push(result);
        }

        registry.unregister(&node, is_main_thread());

        let walk_ok = registry_walk_check();
        log.emit_entry(
            LogEntry::new(
                "",
                if walk_ok { LogLevel::Info } else { LogLevel::Error },
                "registry_walk",
            )
            .with_outcome(if walk_ok { Outcome::Pass } else { Outcome::Fail })
            .with_details(serde_json::json!({ "threads": WALK_THREADS })),
        )?;

        let passed = results.iter().filter(|r| r.passed).count();
        let report = SelfCheckReport {
            run_id: self.run_id.clone(),
            mode: self.mode.as_str(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            registry_walk_ok: walk_ok,
            results,
            metrics: metrics_json(&global_metrics().snapshot()),
        };
        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "self_check_end")
                .with_mode(self.mode.as_str())
                .with_details(report.metrics.clone()),
        )?;
        log.flush()?;
        Ok(report)
    }

    fn run_scenario(&self, registry: &ThreadRegistry, scenario: &Scenario) -> ScenarioResult {
        let env = ScenarioEnv {
            registry,
            scenario,
            nested: Cell::new(None),
        };
        let site = CallSite {
            caller: scenario.caller,
            callee: scenario.callee,
            callee_ptr: (scenario.callee_ptr)(),
        };
        let start = Instant::now();
        let outcome = check_call(&env, &CONTEXT, &site);
        let latency_ns = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let (decision, observed) = match &outcome {
            Ok(acceptance) => (acceptance.as_str().to_owned(), Expect::Accept(*acceptance)),
            Err(GuardError::ForeignCall { .. }) => ("violation".to_owned(), Expect::Violation),
            Err(err @ GuardError::Oracle(_)) => (err.to_string(), Expect::ProbeFailure),
        };
        let mut passed = observed == scenario.expect;
        if scenario.reenter {
            passed &= env.nested.get() == Some(Acceptance::Reentrant);
        }
        ScenarioResult {
            name: scenario.name,
            decision,
            passed,
            latency_ns,
        }
    }
}

/// Register worker threads, walk while they are parked, then walk again
/// after they leave. Each walk must see exactly the live set.
fn registry_walk_check() -> bool {
    let registry = Arc::new(ThreadRegistry::new());
    let registered = Arc::new(Barrier::new(WALK_THREADS + 1));
    let release = Arc::new(Barrier::new(WALK_THREADS + 1));
    let left = Arc::new(Barrier::new(WALK_THREADS + 1));

    let workers: Vec<_> = (0..WALK_THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let registered = Arc::clone(&registered);
            let release = Arc::clone(&release);
            let left = Arc::clone(&left);
            std::thread::spawn(move || {
                let node = registry.register_current_thread(current_thread_identity());
                registered.wait();
                release.wait();
                if let Ok(node) = node {
                    registry.unregister(&node, false);
                }
                left.wait();
            })
        })
        .collect();

    registered.wait();
    let during = registry.iter().count();
    release.wait();
    left.wait();
    let after = registry.iter().count();

    let joined = workers.into_iter().all(|w| w.join().is_ok());
    joined && during == WALK_THREADS && after == 0
}

fn metrics_json(m: &MetricsSnapshot) -> serde_json::Value {
    serde_json::json!({
        "checks": m.checks,
        "nil_sentinel": m.nil_sentinel,
        "tls_teardown": m.tls_teardown,
        "reentrant": m.reentrant,
        "unregistered": m.unregistered,
        "native_state": m.native_state,
        "prefix_hits": m.prefix_hits,
        "prefix_misses": m.prefix_misses,
        "probe_unreadable": m.probe_unreadable,
        "symbols_resolved": m.symbols_resolved,
        "symbols_unresolved": m.symbols_unresolved,
        "name_hits": m.name_hits,
        "name_misses": m.name_misses,
        "violations": m.violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_are_unique() {
        let all = scenarios();
        let mut names: Vec<_> = all.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn every_acceptance_reachable_in_process_is_covered() {
        let all = scenarios();
        for acceptance in [
            Acceptance::NilMessageSend,
            Acceptance::TeardownQuery,
            Acceptance::ThreadLocalTeardown,
            Acceptance::UnregisteredThread,
            Acceptance::NativeState,
            Acceptance::ManagedPrefix,
            Acceptance::AllowListed,
        ] {
            assert!(
                all.iter().any(|s| s.expect == Expect::Accept(acceptance)),
                "{acceptance:?} has no scenario"
            );
        }
    }

    #[test]
    fn registry_walk_sees_live_set() {
        assert!(registry_walk_check());
    }
}
