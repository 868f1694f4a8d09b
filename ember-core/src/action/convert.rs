//! Conversion policies
//!
//! | policy        | conversion set      | on no conversion          |
//! |---------------|---------------------|---------------------------|
//! | ImplicitThrow | implicit            | `Err(ConversionError)`    |
//! | ExplicitThrow | implicit + explicit | `Err(ConversionError)`    |
//! | ImplicitTry   | implicit            | `Ok(NoConversion)`        |
//! | ExplicitTry   | implicit + explicit | `Ok(NoConversion)`        |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ConvertDescriptor;
use crate::runtime::value::{Value, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionResultKind {
    ImplicitThrow,
    ExplicitThrow,
    ImplicitTry,
    ExplicitTry,
}

impl ConversionResultKind {
    /// Whether lossy/explicit conversions are in the attempted set
    pub fn allows_explicit(&self) -> bool {
        matches!(
            self,
            ConversionResultKind::ExplicitThrow | ConversionResultKind::ExplicitTry
        )
    }

    /// Whether failure is reported as a value instead of an error
    pub fn is_try(&self) -> bool {
        matches!(
            self,
            ConversionResultKind::ImplicitTry | ConversionResultKind::ExplicitTry
        )
    }
}

/// Result of a conversion under a Try policy
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Converted(Value),
    NoConversion,
}

impl ConversionOutcome {
    /// Collapse into the historical sentinel shape: the target's default value
    /// on failure. Ambiguous with a genuine conversion to that default.
    pub fn into_sentinel(self, target: ValueKind) -> Value {
        match self {
            ConversionOutcome::Converted(value) => value,
            ConversionOutcome::NoConversion => target.default_value(),
        }
    }

    pub fn converted(self) -> Option<Value> {
        match self {
            ConversionOutcome::Converted(value) => Some(value),
            ConversionOutcome::NoConversion => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("cannot convert {from} to {to} ({policy:?})")]
    NoConversion {
        from: ValueKind,
        to: ValueKind,
        policy: ConversionResultKind,
    },
}

impl ConvertDescriptor {
    /// Apply the result policy to the outcome of a conversion attempt
    pub fn complete(
        &self,
        from: ValueKind,
        found: Option<Value>,
    ) -> Result<ConversionOutcome, ConversionError> {
        match found {
            Some(value) => Ok(ConversionOutcome::Converted(value)),
            None if self.policy.is_try() => Ok(ConversionOutcome::NoConversion),
            None => Err(ConversionError::NoConversion {
                from,
                to: self.target,
                policy: self.policy,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(policy: ConversionResultKind) -> ConvertDescriptor {
        ConvertDescriptor {
            target: ValueKind::Int,
            policy,
        }
    }

    #[test]
    fn test_policy_flags() {
        assert!(!ConversionResultKind::ImplicitThrow.allows_explicit());
        assert!(ConversionResultKind::ExplicitThrow.allows_explicit());
        assert!(ConversionResultKind::ImplicitTry.is_try());
        assert!(!ConversionResultKind::ExplicitThrow.is_try());
    }

    #[test]
    fn test_throw_policies_escalate() {
        for policy in [
            ConversionResultKind::ImplicitThrow,
            ConversionResultKind::ExplicitThrow,
        ] {
            let err = descriptor(policy).complete(ValueKind::Str, None).unwrap_err();
            assert_eq!(
                err,
                ConversionError::NoConversion {
                    from: ValueKind::Str,
                    to: ValueKind::Int,
                    policy,
                }
            );
        }
    }

    #[test]
    fn test_try_policies_report_no_conversion() {
        for policy in [
            ConversionResultKind::ImplicitTry,
            ConversionResultKind::ExplicitTry,
        ] {
            let outcome = descriptor(policy).complete(ValueKind::Str, None).unwrap();
            assert_eq!(outcome, ConversionOutcome::NoConversion);
            assert_eq!(outcome.into_sentinel(ValueKind::Int), Value::Int(0));
        }
    }

    #[test]
    fn test_found_value_passes_through() {
        let outcome = descriptor(ConversionResultKind::ImplicitThrow)
            .complete(ValueKind::Bool, Some(Value::Int(1)))
            .unwrap();
        assert_eq!(outcome.converted(), Some(Value::Int(1)));
    }
}
