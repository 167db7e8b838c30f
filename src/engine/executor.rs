//! Plan execution with per-document serialization and cross-document parallelism

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use rayon::prelude::*;
use reconcile::{DesiredResource, Deletion, Engine, Tracked};
use std::sync::{Arc, Mutex};

use super::planner::{Action, Plan, Stage};
use crate::progress;
use crate::state::AppliedState;

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of documents written in parallel
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
        }
    }
}

/// Asks whether to go ahead with a plan.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Always proceeds.
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on the terminal.
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

/// What happened to one action.
#[derive(Debug)]
pub enum Outcome {
    Created(Tracked<DesiredResource>),
    Updated(Tracked<DesiredResource>),
    Deleted,
    /// The object vanished before it could be updated.
    Gone,
    Failed {
        message: String,
        advice: &'static str,
    },
}

#[derive(Debug)]
pub struct ActionResult {
    pub address: String,
    pub outcome: Outcome,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
}

/// One action that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub address: String,
    pub message: String,
    pub advice: &'static str,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Execute the plan, recording every outcome in `state`.
///
/// Stages run in order. Within a stage, each remote document is written by
/// one worker at a time; distinct documents are written in parallel.
pub fn execute(
    engine: &Engine,
    plan: &Plan,
    state: &mut AppliedState,
    opts: &ExecuteOptions,
    confirm: &dyn Confirm,
) -> Result<ExecuteSummary> {
    if plan.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if !opts.yes && !opts.dry_run && !confirm.confirm("Continue?")? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: plan.actions.len(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    let mut summary = ExecuteSummary::default();
    for stage in [Stage::Objects, Stage::Rules, Stage::Cleanup] {
        let groups: Vec<Vec<&Action>> = plan.groups(stage).into_values().collect();
        if groups.is_empty() {
            continue;
        }
        let count: usize = groups.iter().map(Vec::len).sum();
        log::info!("{stage:?}: {count} actions across {} documents", groups.len());

        let results = execute_groups(engine, &groups, opts.jobs, opts.verbose)?;
        record_results(state, &mut summary, results);
    }

    print_summary(&summary);
    Ok(summary)
}

/// Run one action against the manager.
pub fn run_action(engine: &Engine, action: &Action) -> Outcome {
    let result = match action {
        Action::Create { desired, .. } => engine.create(desired).map(Outcome::Created),
        Action::Update { handle, desired, .. } => engine
            .update(handle, desired)
            .map(|updated| updated.map_or(Outcome::Gone, Outcome::Updated)),
        Action::Delete { handle, .. } => engine.delete(action.kind(), handle).map(|deletion| {
            if deletion == Deletion::AlreadyAbsent {
                log::debug!("{} was already absent", action.address());
            }
            Outcome::Deleted
        }),
    };
    result.unwrap_or_else(|e| Outcome::Failed {
        message: e.to_string(),
        advice: e.category().advice(),
    })
}

/// Execute groups in parallel, the actions of each group in order
fn execute_groups(
    engine: &Engine,
    groups: &[Vec<&Action>],
    jobs: usize,
    verbose: bool,
) -> Result<Vec<ActionResult>> {
    let total = groups.iter().map(Vec::len).sum::<usize>() as u64;
    let pb = progress::bar(total, "Applying");
    let results: Arc<Mutex<Vec<ActionResult>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        groups.par_iter().for_each(|group| {
            for action in group {
                let outcome = run_action(engine, action);

                let symbol = match &outcome {
                    Outcome::Created(_) | Outcome::Updated(_) | Outcome::Deleted => "✓",
                    Outcome::Gone => "⊘",
                    Outcome::Failed { .. } => "✗",
                };
                if verbose {
                    pb.println(format!("  {symbol} {}", action.address()));
                }
                pb.set_message(format!("{symbol} {}", action.address()));
                pb.inc(1);

                push_action_result(
                    &results,
                    ActionResult {
                        address: action.address().to_string(),
                        outcome,
                    },
                );
            }
        });
    });

    pb.finish_and_clear();

    into_action_results(results)
}

fn push_action_result(results: &Arc<Mutex<Vec<ActionResult>>>, result: ActionResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_action_results(results: Arc<Mutex<Vec<ActionResult>>>) -> Result<Vec<ActionResult>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Fold results into state and summary
fn record_results(state: &mut AppliedState, summary: &mut ExecuteSummary, results: Vec<ActionResult>) {
    for ActionResult { address, outcome } in results {
        match outcome {
            Outcome::Created(tracked) => {
                state.record(&address, tracked);
                summary.created += 1;
            }
            Outcome::Updated(tracked) => {
                state.record(&address, tracked);
                summary.updated += 1;
            }
            Outcome::Deleted => {
                state.forget(&address);
                summary.deleted += 1;
            }
            Outcome::Gone => {
                log::warn!("{address} disappeared before it could be updated");
                state.forget(&address);
                summary.skipped += 1;
            }
            Outcome::Failed { message, advice } => {
                log::error!("{address}: {message}");
                summary.failed += 1;
                summary.failures.push(Failure {
                    address,
                    message,
                    advice,
                });
            }
        }
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() && summary.total_changes() == 0 {
        println!("  {} Nothing was changed", "ℹ".blue());
    } else if summary.is_success() {
        println!("  {} Changes applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Changes applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for failure in &summary.failures {
            println!("      {} {}: {}", "✗".red(), failure.address, failure.message);
            println!("        {}", failure.advice.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner;
    use nsxkit::{Method, MockTransport, Response};
    use reconcile::{EngineOptions, IpSetSpec, Phase};
    use std::collections::BTreeMap;

    const LIST: &str = "/api/2.0/services/ipset/scope/globalroot-0";
    const CREATE: &str = "/api/2.0/services/ipset/globalroot-0";

    struct Answer(bool);

    impl Confirm for Answer {
        fn confirm(&self, _prompt: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    fn ip_set(name: &str) -> DesiredResource {
        DesiredResource::IpSet(IpSetSpec {
            scope: "globalroot-0".into(),
            name: name.into(),
            description: String::new(),
            value: "10.0.0.1".into(),
            object_id: None,
        })
    }

    fn setup() -> (Arc<MockTransport>, Engine) {
        let mock = Arc::new(MockTransport::new());
        let engine = Engine::new(Arc::clone(&mock), EngineOptions::default());
        (mock, engine)
    }

    /// Plan that creates `web` and deletes the already-vanished `old`.
    fn create_and_delete(state: &mut AppliedState) -> Plan {
        let old = ip_set("old");
        state.record(&old.address(), Tracked::new("globalroot-0_old", Phase::Created, old));
        let desired: BTreeMap<_, _> = [ip_set("web")].into_iter().map(|r| (r.address(), r)).collect();
        planner::plan(&desired, state)
    }

    fn yes() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            jobs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_execute_records_state() {
        let (mock, engine) = setup();
        mock.respond(Method::Get, LIST, Response::ok("[]"));
        mock.respond(Method::Post, CREATE, Response::ok("ipset-5"));

        let mut state = AppliedState::default();
        let plan = create_and_delete(&mut state);
        let summary = execute(&engine, &plan, &mut state, &yes(), &AutoConfirm).unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.created, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.total_changes(), 2);

        let entry = state.get("ip_set:globalroot-0/web").unwrap();
        assert_eq!(entry.handle, "globalroot-0_web");
        assert_eq!(entry.phase, Phase::Created);
        assert!(state.get("ip_set:globalroot-0/old").is_none());
    }

    #[test]
    fn test_failure_leaves_state_alone() {
        let (mock, engine) = setup();
        mock.respond(Method::Get, LIST, Response::ok("[]"));
        mock.respond(Method::Post, CREATE, Response::new(400, "invalid value"));

        let mut state = AppliedState::default();
        let plan = create_and_delete(&mut state);
        let summary = execute(&engine, &plan, &mut state, &yes(), &AutoConfirm).unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].address, "ip_set:globalroot-0/web");
        assert!(summary.failures[0].message.contains("400"));
        assert!(state.get("ip_set:globalroot-0/web").is_none());
        assert_eq!(summary.deleted, 1);
    }

    #[test]
    fn test_dry_run_and_decline_write_nothing() {
        let (mock, engine) = setup();
        let mut state = AppliedState::default();
        let plan = create_and_delete(&mut state);

        let dry = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = execute(&engine, &plan, &mut state, &dry, &Answer(true)).unwrap();
        assert_eq!(summary.total_changes(), 0);

        let summary =
            execute(&engine, &plan, &mut state, &ExecuteOptions::default(), &Answer(false)).unwrap();
        assert_eq!(summary.skipped, 2);

        assert!(mock.calls().is_empty());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_update_of_vanished_object_forgets_it() {
        let (mock, engine) = setup();
        mock.respond(Method::Get, LIST, Response::ok("[]"));

        let mut state = AppliedState::default();
        let tracked = ip_set("web");
        state.record(&tracked.address(), Tracked::new("globalroot-0_web", Phase::Created, tracked));

        let changed = IpSetSpec {
            scope: "globalroot-0".into(),
            name: "web".into(),
            description: String::new(),
            value: "10.0.0.9".into(),
            object_id: None,
        };
        let desired: BTreeMap<_, _> = [DesiredResource::IpSet(changed)]
            .into_iter()
            .map(|r| (r.address(), r))
            .collect();
        let plan = planner::plan(&desired, &state);
        assert_eq!(plan.actions.len(), 1);

        let summary = execute(&engine, &plan, &mut state, &yes(), &AutoConfirm).unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(state.is_empty());
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn push_action_result_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ActionResult>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_action_result(
            &results,
            ActionResult {
                address: "ip_set:globalroot-0/web".into(),
                outcome: Outcome::Deleted,
            },
        );

        let len = match results.lock() {
            Ok(locked) => locked.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        assert_eq!(len, 1);
    }

    #[test]
    fn into_action_results_recovers_from_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ActionResult>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let mut guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            guard.push(ActionResult {
                address: "ip_set:globalroot-0/web".into(),
                outcome: Outcome::Gone,
            });
            panic!("intentional poison");
        })
        .join();

        let collected = into_action_results(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }
}
