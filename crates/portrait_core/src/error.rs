use crate::point::Point;
use thiserror::Error;

/// Errors raised by the numeric core.
///
/// A malformed point string is not an error: [`Point::try_parse`] reports it
/// as `None`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortraitError {
    /// A derivative evaluation or the stepped state left the finite reals.
    #[error("numeric overflow in RK4 stage {stage} at {point}")]
    NumericOverflow { stage: &'static str, point: Point },

    /// A solving function is not finite at the given abscissa.
    #[error("solving function is not finite at x = {x}")]
    DomainError { x: f64 },

    #[error("expected {expected}, found {found:?}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("basin tracing supports exactly 2 equilibrium points, got {0}")]
    UnsupportedBasinCount(usize),

    #[error("parameter `{0}` is not bound")]
    MissingParameter(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("computation cancelled")]
    Cancelled,
}

impl PortraitError {
    /// True for the failures that basin classification absorbs per cell.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PortraitError::NumericOverflow { .. } | PortraitError::DomainError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PortraitError;
    use crate::point::Point;

    #[test]
    fn numeric_errors_are_flagged() {
        let overflow = PortraitError::NumericOverflow {
            stage: "k1",
            point: Point::new(1.0, 2.0),
        };
        assert!(overflow.is_numeric());
        assert!(PortraitError::DomainError { x: 0.5 }.is_numeric());
        assert!(!PortraitError::UnsupportedBasinCount(3).is_numeric());
        assert!(!PortraitError::Cancelled.is_numeric());
    }

    #[test]
    fn messages_name_the_offending_value() {
        let err = PortraitError::UnsupportedBasinCount(3);
        assert!(err.to_string().contains("got 3"), "unexpected message: {err}");
        let err = PortraitError::NumericOverflow {
            stage: "l4",
            point: Point::new(0.5, 1.5),
        };
        let message = err.to_string();
        assert!(message.contains("l4"), "unexpected message: {message}");
        assert!(message.contains("Point(0.5, 1.5)"), "unexpected message: {message}");
    }
}
