use serde::{Deserialize, Serialize};

use crate::judge::Judgment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
}

/// `None` means the environment could not be built or replayed.
pub fn classify_outcome(judgment: Option<&Judgment>) -> Outcome {
    match judgment {
        Some(judgment) if judgment.all_passed() => Outcome::Pass,
        Some(_) => Outcome::Fail,
        None => Outcome::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::CheckOutcome;

    fn judgment(pass: bool) -> Judgment {
        Judgment {
            checks: vec![CheckOutcome::NoDivergence {
                passed: pass,
                divergences: usize::from(!pass),
            }],
        }
    }

    #[test]
    fn pass_when_checks_pass() {
        assert_eq!(classify_outcome(Some(&judgment(true))), Outcome::Pass);
    }

    #[test]
    fn fail_when_a_check_fails() {
        assert_eq!(classify_outcome(Some(&judgment(false))), Outcome::Fail);
    }

    #[test]
    fn error_without_judgment() {
        assert_eq!(classify_outcome(None), Outcome::Error);
    }
}
