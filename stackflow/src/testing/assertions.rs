//! Test assertions for lifecycle outcomes and plan results.

use crate::core::{Outcome, Outputs};
use crate::orchestrator::PlanResult;

/// Asserts that the outcome is `Succeeded` and returns its outputs.
pub fn assert_succeeded(outcome: &Outcome) -> &Outputs {
    match outcome {
        Outcome::Succeeded { outputs } => outputs,
        other => panic!("Expected SUCCEEDED, got {other}"),
    }
}

/// Asserts that the outcome is `NoChange` and returns its outputs.
pub fn assert_no_change(outcome: &Outcome) -> &Outputs {
    match outcome {
        Outcome::NoChange { outputs } => outputs,
        other => panic!("Expected NO_CHANGE, got {other}"),
    }
}

/// Asserts that the outcome is `Failed` with the given failure label
/// (e.g. "timeout").
pub fn assert_failed_with(outcome: &Outcome, label: &str) {
    let failure = outcome
        .failure()
        .unwrap_or_else(|| panic!("Expected FAILED({label}), got {outcome}"));
    assert_eq!(
        failure.label(),
        label,
        "Expected failure '{}', got '{}': {}",
        label,
        failure.label(),
        failure
    );
}

/// Asserts that a successful outcome carries exactly the expected outputs.
pub fn assert_outputs_eq(outcome: &Outcome, expected: &[(&str, &str)]) {
    let actual = outcome
        .outputs()
        .unwrap_or_else(|| panic!("Expected outputs, got {outcome}"));
    let expected: Outputs = expected
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    assert_eq!(actual, &expected, "Outputs differ");
}

/// Asserts that the run aborted at the named stack.
pub fn assert_aborted_at(result: &PlanResult, stack: &str) {
    let abort = result
        .aborted_at
        .as_ref()
        .unwrap_or_else(|| panic!("Expected the run to abort at '{stack}', but it completed"));
    assert_eq!(
        abort.stack, stack,
        "Expected abort at '{}', got '{}' ({})",
        stack, abort.stack, abort.reason
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DeployFailure;

    #[test]
    fn test_outcome_assertions() {
        let mut outputs = Outputs::new();
        outputs.insert("CertificateArn".to_string(), "arn:cert".to_string());

        let ok = Outcome::succeeded(outputs.clone());
        assert_eq!(assert_succeeded(&ok), &outputs);
        assert_outputs_eq(&ok, &[("CertificateArn", "arn:cert")]);

        assert_no_change(&Outcome::no_change(Outputs::new()));
        assert_failed_with(
            &Outcome::failed(DeployFailure::Vanished {
                stack: "web".to_string(),
            }),
            "vanished",
        );
    }

    #[test]
    #[should_panic(expected = "Expected SUCCEEDED")]
    fn test_assert_succeeded_panics_on_failure() {
        assert_succeeded(&Outcome::failed(DeployFailure::StackBusy {
            stack: "web".to_string(),
        }));
    }
}
