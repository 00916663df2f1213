//! Rule validation engine.
//!
//! [`evaluate`] is a pure function of a process's numeric attributes and an
//! ordered rule sequence. It reads nothing else and writes nothing; the
//! caller decides whether to persist the resulting status.
//!
//! Each rule yields exactly one [`Verdict`], in input order:
//!
//! - `Passed`: the attribute satisfies the comparison.
//! - `Violation`: the attribute was compared and failed. This is a business
//!   outcome, fixed by amending the application.
//! - `ConfigurationError`: the attribute is absent or not a finite number, so
//!   nothing could be compared. Fixed by correcting the rule or the data.
//!
//! A configuration error on one rule never stops evaluation of the rest.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{NumericFields, Operator, ProcessField, ProcessStatus, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Passed,
    Violation,
    ConfigurationError,
}

/// Outcome of one rule against one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub rule_id: i64,
    pub article: String,
    pub field: ProcessField,
    pub operator: Operator,
    pub reference: f64,
    /// Value read from the process; `None` when absent or not a finite number.
    pub value: Option<f64>,
    pub passed: bool,
    pub kind: VerdictKind,
    pub message: String,
}

impl Verdict {
    pub fn is_configuration_error(&self) -> bool {
        self.kind == VerdictKind::ConfigurationError
    }
}

/// Ordered verdicts plus the aggregate status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdicts: Vec<Verdict>,
    pub status: ProcessStatus,
}

impl Evaluation {
    pub fn approved(&self) -> bool {
        self.status == ProcessStatus::Approved
    }

    /// Messages of every failing verdict, in rule order.
    pub fn messages(&self) -> Vec<&str> {
        self.failures().map(|v| v.message.as_str()).collect()
    }

    /// Failing messages joined one per line.
    pub fn summary(&self) -> String {
        self.messages().join("\n")
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    pub fn of_kind(&self, kind: VerdictKind) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(move |v| v.kind == kind)
    }

    pub fn count(&self, kind: VerdictKind) -> usize {
        self.of_kind(kind).count()
    }
}

/// Evaluate every rule against `subject`, preserving rule order.
///
/// An empty rule slice approves vacuously.
pub fn evaluate<S: NumericFields + ?Sized>(subject: &S, rules: &[Rule]) -> Evaluation {
    let verdicts: Vec<Verdict> = rules.iter().map(|rule| evaluate_rule(subject, rule)).collect();
    let status = if verdicts.iter().all(|v| v.passed) {
        ProcessStatus::Approved
    } else {
        ProcessStatus::Rejected
    };
    debug!(
        rules = rules.len(),
        failed = verdicts.iter().filter(|v| !v.passed).count(),
        status = %status,
        "evaluated rules"
    );
    Evaluation { verdicts, status }
}

/// Evaluate a single rule.
pub fn evaluate_rule<S: NumericFields + ?Sized>(subject: &S, rule: &Rule) -> Verdict {
    let value = subject.numeric(rule.field).filter(|v| v.is_finite());

    let (kind, message) = match value {
        None => (
            VerdictKind::ConfigurationError,
            format!(
                "{}: erro de configuração, o campo '{}' não possui valor numérico no processo",
                rule.article, rule.field
            ),
        ),
        Some(v) if rule.operator.apply(v, rule.reference) => (
            VerdictKind::Passed,
            format!(
                "{}: {} = {} atende {} {}",
                rule.article, rule.field, v, rule.operator, rule.reference
            ),
        ),
        Some(v) => (VerdictKind::Violation, violation_message(rule, v)),
    };

    Verdict {
        rule_id: rule.id,
        article: rule.article.clone(),
        field: rule.field,
        operator: rule.operator,
        reference: rule.reference,
        value,
        passed: kind == VerdictKind::Passed,
        kind,
        message,
    }
}

fn violation_message(rule: &Rule, value: f64) -> String {
    if rule.message.trim().is_empty() {
        return format!(
            "{}: {} = {} não atende {} {}",
            rule.article, rule.field, value, rule.operator, rule.reference
        );
    }
    rule.message
        .replace("{field}", rule.field.name())
        .replace("{value}", &value.to_string())
        .replace("{operator}", rule.operator.symbol())
        .replace("{reference}", &rule.reference.to_string())
        .replace("{article}", &rule.article)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::NewProcess;

    fn rule(id: i64, field: ProcessField, operator: Operator, reference: f64) -> Rule {
        Rule {
            id,
            legislation_id: 1,
            article: format!("Art. {id}"),
            description: String::new(),
            field,
            operator,
            reference,
            message: String::new(),
        }
    }

    fn area(value: f64) -> BTreeMap<ProcessField, f64> {
        BTreeMap::from([(ProcessField::TotalArea, value)])
    }

    #[test]
    fn empty_rules_approve_vacuously() {
        let eval = evaluate(&area(50.0), &[]);
        assert_eq!(eval.status, ProcessStatus::Approved);
        assert!(eval.verdicts.is_empty());
        assert!(eval.messages().is_empty());
        assert_eq!(eval.summary(), "");
    }

    #[test]
    fn boundary_is_inclusive_for_greater_or_equal() {
        let rules = [rule(1, ProcessField::TotalArea, Operator::GreaterOrEqual, 100.0)];
        let eval = evaluate(&area(100.0), &rules);
        assert!(eval.verdicts[0].passed);
        assert_eq!(eval.verdicts[0].kind, VerdictKind::Passed);
        assert!(eval.approved());
    }

    #[test]
    fn just_below_boundary_fails() {
        let rules = [rule(1, ProcessField::TotalArea, Operator::GreaterOrEqual, 100.0)];
        let eval = evaluate(&area(99.999999), &rules);
        assert!(!eval.verdicts[0].passed);
        assert_eq!(eval.verdicts[0].kind, VerdictKind::Violation);
        assert_eq!(eval.status, ProcessStatus::Rejected);
    }

    #[test]
    fn absent_field_is_configuration_error_and_evaluation_continues() {
        let rules = [
            rule(1, ProcessField::Height, Operator::LessOrEqual, 9.0),
            rule(2, ProcessField::TotalArea, Operator::GreaterThan, 10.0),
        ];
        let eval = evaluate(&area(50.0), &rules);
        assert_eq!(eval.verdicts.len(), 2);

        let first = &eval.verdicts[0];
        assert!(!first.passed);
        assert!(first.is_configuration_error());
        assert_eq!(first.value, None);
        assert!(first.message.contains("erro de configuração"));
        assert!(first.message.contains("altura"));

        assert!(eval.verdicts[1].passed);
        assert_eq!(eval.status, ProcessStatus::Rejected);
        assert_eq!(eval.count(VerdictKind::ConfigurationError), 1);
        assert_eq!(eval.count(VerdictKind::Violation), 0);
    }

    #[test]
    fn nan_value_is_configuration_error() {
        let rules = [rule(1, ProcessField::TotalArea, Operator::GreaterThan, 0.0)];
        let eval = evaluate(&area(f64::NAN), &rules);
        assert_eq!(eval.verdicts[0].kind, VerdictKind::ConfigurationError);
    }

    #[test]
    fn first_fails_second_passes_yields_one_message() {
        let rules = [
            rule(1, ProcessField::TotalArea, Operator::LessThan, 40.0),
            rule(2, ProcessField::TotalArea, Operator::GreaterThan, 10.0),
        ];
        let eval = evaluate(&area(50.0), &rules);
        assert_eq!(eval.status, ProcessStatus::Rejected);
        assert_eq!(eval.messages(), vec!["Art. 1: area_total = 50 não atende < 40"]);
    }

    #[test]
    fn messages_follow_rule_order_not_rule_id() {
        let rules = [
            rule(9, ProcessField::TotalArea, Operator::LessThan, 10.0),
            rule(3, ProcessField::Floors, Operator::LessOrEqual, 2.0),
            rule(5, ProcessField::TotalArea, Operator::GreaterThan, 100.0),
        ];
        let mut subject = area(50.0);
        subject.insert(ProcessField::Floors, 4.0);
        let eval = evaluate(&subject, &rules);
        let ids: Vec<i64> = eval.failures().map(|v| v.rule_id).collect();
        assert_eq!(ids, vec![9, 3, 5]);
        assert_eq!(eval.summary().lines().count(), 3);
    }

    #[test]
    fn template_placeholders_substituted() {
        let mut r = rule(1, ProcessField::Height, Operator::LessOrEqual, 9.0);
        r.article = "Art. 41".into();
        r.message = "{article}: {field} de {value} m excede o limite {operator} {reference} m".into();
        let subject = BTreeMap::from([(ProcessField::Height, 12.5)]);
        let verdict = evaluate_rule(&subject, &r);
        assert_eq!(
            verdict.message,
            "Art. 41: altura de 12.5 m excede o limite <= 9 m"
        );
    }

    #[test]
    fn hash_map_subject_matches_process() {
        let process = NewProcess::new("2024/0009", "Lia", "Eng. Tomás", "residencial", 150.0)
            .with_attribute(ProcessField::Floors, 3.0)
            .into_process(1, chrono::Utc::now())
            .unwrap();
        let map: HashMap<ProcessField, f64> = process.attributes().into_iter().collect();
        let rules = [
            rule(1, ProcessField::TotalArea, Operator::GreaterOrEqual, 100.0),
            rule(2, ProcessField::Floors, Operator::LessThan, 3.0),
            rule(3, ProcessField::Height, Operator::LessOrEqual, 9.0),
        ];
        assert_eq!(evaluate(&map, &rules), evaluate(&process, &rules));
    }

    #[test]
    fn template_unused_for_passing_rules() {
        let mut r = rule(1, ProcessField::Height, Operator::LessOrEqual, 9.0);
        r.message = "altura excedida".into();
        let subject = BTreeMap::from([(ProcessField::Height, 6.0)]);
        let verdict = evaluate_rule(&subject, &r);
        assert!(verdict.passed);
        assert!(verdict.message.contains("atende"));
    }

    #[test]
    fn equals_uses_exact_comparison() {
        let rules = [rule(1, ProcessField::TotalArea, Operator::Equals, 0.3)];
        let eval = evaluate(&area(0.1 + 0.2), &rules);
        assert_eq!(eval.verdicts[0].kind, VerdictKind::Violation);
    }

    #[test]
    fn evaluation_serialises_status_label() {
        let eval = evaluate(&area(1.0), &[]);
        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["status"], "Aprovado");
    }

    fn any_operator() -> impl Strategy<Value = Operator> {
        prop::sample::select(Operator::ALL.to_vec())
    }

    fn any_field() -> impl Strategy<Value = ProcessField> {
        prop::sample::select(ProcessField::ALL.to_vec())
    }

    prop_compose! {
        fn any_rule()(
            id in 1i64..1000,
            field in any_field(),
            operator in any_operator(),
            reference in -1e6f64..1e6,
        ) -> Rule {
            rule(id, field, operator, reference)
        }
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(
            rules in prop::collection::vec(any_rule(), 0..12),
            values in prop::collection::btree_map(any_field(), 0f64..1e6, 0..6),
        ) {
            let first = evaluate(&values, &rules);
            let second = evaluate(&values, &rules);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn one_verdict_per_rule_in_order(
            rules in prop::collection::vec(any_rule(), 0..12),
            values in prop::collection::btree_map(any_field(), 0f64..1e6, 0..6),
        ) {
            let eval = evaluate(&values, &rules);
            let ids: Vec<i64> = eval.verdicts.iter().map(|v| v.rule_id).collect();
            let expected: Vec<i64> = rules.iter().map(|r| r.id).collect();
            prop_assert_eq!(ids, expected);
        }

        #[test]
        fn approved_iff_every_verdict_passes(
            rules in prop::collection::vec(any_rule(), 0..12),
            values in prop::collection::btree_map(any_field(), 0f64..1e6, 0..6),
        ) {
            let eval = evaluate(&values, &rules);
            prop_assert_eq!(eval.approved(), eval.verdicts.iter().all(|v| v.passed));
            prop_assert_eq!(eval.messages().len(), eval.failures().count());
        }

        #[test]
        fn operators_match_float_comparison(value in -1e6f64..1e6, reference in -1e6f64..1e6) {
            let subject = area(value);
            let check = |op: Operator| evaluate_rule(&subject, &rule(1, ProcessField::TotalArea, op, reference)).passed;
            prop_assert_eq!(check(Operator::Equals), value == reference);
            prop_assert_eq!(check(Operator::NotEquals), value != reference);
            prop_assert_eq!(check(Operator::GreaterThan), value > reference);
            prop_assert_eq!(check(Operator::GreaterOrEqual), value >= reference);
            prop_assert_eq!(check(Operator::LessThan), value < reference);
            prop_assert_eq!(check(Operator::LessOrEqual), value <= reference);
        }
    }
}
