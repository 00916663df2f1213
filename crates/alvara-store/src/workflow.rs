//! Validation workflow: reads from the stores, runs the engine, and
//! optionally persists the aggregate status.
//!
//! Store failures abort before anything is evaluated, so a caller never sees
//! a partial verdict list.

use alvara_core::{Evaluation, Process, Rule, evaluate};
use tracing::{info, warn};

use crate::{LegislationStore, ProcessStore, StoreError};

/// Which legislations' rules apply to a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    /// Every legislation unrestricted or restricted to the process's land use.
    LandUse,
    /// Exactly these legislations, in this order. Each must exist; a name
    /// repeated later in the list is ignored.
    Legislations(Vec<String>),
}

/// Result of validating one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub process: Process,
    pub rules: Vec<Rule>,
    pub evaluation: Evaluation,
}

/// Resolve the ordered rule sequence for `process` under `scope`.
pub fn collect_rules<L: LegislationStore + ?Sized>(
    legislations: &L,
    process: &Process,
    scope: &RuleScope,
) -> Result<Vec<Rule>, StoreError> {
    match scope {
        RuleScope::LandUse => legislations.rules_for_land_use(&process.land_use),
        RuleScope::Legislations(names) => {
            let mut rules = Vec::new();
            let mut seen: Vec<&str> = Vec::new();
            for name in names {
                let name = name.as_str();
                if seen.contains(&name) {
                    continue;
                }
                seen.push(name);
                rules.extend(legislations.rules(name)?);
            }
            Ok(rules)
        }
    }
}

/// Validate the process registered under `number`.
///
/// Does not modify either store; see [`record_outcome`].
pub fn validate_process<P, L>(
    processes: &P,
    legislations: &L,
    number: &str,
    scope: &RuleScope,
) -> Result<Validation, StoreError>
where
    P: ProcessStore + ?Sized,
    L: LegislationStore + ?Sized,
{
    let process = processes.process(number)?;
    let rules = collect_rules(legislations, &process, scope)?;
    if rules.is_empty() {
        warn!(number = %process.number, "no applicable rules; approving vacuously");
    }
    let evaluation = evaluate(&process, &rules);
    info!(
        number = %process.number,
        rules = rules.len(),
        failed = evaluation.failures().count(),
        status = %evaluation.status,
        "validated process"
    );
    Ok(Validation {
        process,
        rules,
        evaluation,
    })
}

/// Persist the aggregate status of `evaluation` on the process.
pub fn record_outcome<P: ProcessStore + ?Sized>(
    processes: &mut P,
    number: &str,
    evaluation: &Evaluation,
) -> Result<Process, StoreError> {
    processes.set_status(number, evaluation.status)
}
