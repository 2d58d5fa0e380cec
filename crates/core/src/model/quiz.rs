use thiserror::Error;

/// Minimum score, in percent, for a quiz attempt to gate a step open.
pub const PASSING_THRESHOLD: f64 = 90.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuizScoreError {
    #[error("quiz score percentage must be between 0 and 100, got {0}")]
    OutOfRange(f64),
}

/// Ephemeral score for a single step-completion attempt.
///
/// Quiz scores are inputs to the completion transition; they are never
/// persisted as entities of their own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizScore {
    percentage: f64,
}

impl QuizScore {
    /// Creates a quiz score.
    ///
    /// # Errors
    ///
    /// Returns `QuizScoreError::OutOfRange` if the percentage is not a
    /// finite value in `[0, 100]`.
    pub fn new(percentage: f64) -> Result<Self, QuizScoreError> {
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(QuizScoreError::OutOfRange(percentage));
        }
        Ok(Self { percentage })
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// True when the score clears the 90% gate.
    #[must_use]
    pub fn is_passing(&self) -> bool {
        self.percentage >= PASSING_THRESHOLD
    }
}
