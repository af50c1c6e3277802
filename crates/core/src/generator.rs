//! Question generation for each operation/stage pair.
//!
//! Pure given an RNG: no state, no side effects. Operand ranges per stage are
//! hard invariants the tests sample against.

use rand::Rng;

use crate::model::{Operation, Question};

/// Generate a question using the thread-local RNG.
#[must_use]
pub fn generate(operation: Operation, stage: u32) -> Question {
    generate_with(&mut rand::rng(), operation, stage)
}

/// Generate a question from the supplied RNG.
///
/// Ranges are inclusive. Subtraction draws the subtrahend from
/// `0..=minuend`, so the answer is never negative. An `Unknown` operation
/// yields the fixed degenerate question `1 + 1 = ?`.
#[must_use]
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, operation: Operation, stage: u32) -> Question {
    match operation {
        Operation::Addition => {
            let max = match stage {
                1 => 5,
                2 => 10,
                _ => 20,
            };
            let a = rng.random_range(0..=max);
            let b = rng.random_range(0..=max);
            Question::new(a, operation.symbol(), b, a + b)
        }
        Operation::Subtraction => {
            let max = if stage == 1 { 10 } else { 20 };
            let a = rng.random_range(1..=max);
            let b = rng.random_range(0..=a);
            Question::new(a, operation.symbol(), b, a - b)
        }
        Operation::Multiplication => {
            let (a, b) = match stage {
                1 => (rng.random_range(1..=5), rng.random_range(1..=5)),
                2 => (rng.random_range(6..=10), rng.random_range(1..=10)),
                _ => (rng.random_range(1..=10), rng.random_range(1..=10)),
            };
            Question::new(a, operation.symbol(), b, a * b)
        }
        Operation::Unknown => Question::new(1, '+', 1, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 10_000;

    #[test]
    fn addition_answers_stay_in_stage_bounds() {
        let mut rng = rand::rng();
        for (stage, max) in [(1, 5), (2, 10), (3, 20), (7, 20)] {
            for _ in 0..SAMPLES {
                let q = generate_with(&mut rng, Operation::Addition, stage);
                assert!(
                    (0..=2 * max).contains(&q.answer),
                    "stage {stage}: {} out of bounds",
                    q.text
                );
            }
        }
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let mut rng = rand::rng();
        for stage in [1, 2, 5] {
            let max = if stage == 1 { 10 } else { 20 };
            for _ in 0..SAMPLES {
                let q = generate_with(&mut rng, Operation::Subtraction, stage);
                assert!((0..=max).contains(&q.answer), "{} out of bounds", q.text);
            }
        }
    }

    #[test]
    fn multiplication_answers_stay_in_stage_bounds() {
        let mut rng = rand::rng();
        for (stage, lo, hi) in [(1, 1, 25), (2, 6, 100), (3, 1, 100)] {
            for _ in 0..SAMPLES {
                let q = generate_with(&mut rng, Operation::Multiplication, stage);
                assert!(
                    (lo..=hi).contains(&q.answer),
                    "stage {stage}: {} out of bounds",
                    q.text
                );
            }
        }
    }

    #[test]
    fn question_text_embeds_operands_and_symbol() {
        let mut rng = rand::rng();
        let q = generate_with(&mut rng, Operation::Multiplication, 1);
        assert!(q.text.contains('x'));
        assert!(q.text.ends_with("= ?"));
    }

    #[test]
    fn unknown_operation_falls_back_to_degenerate_question() {
        let q = generate(Operation::Unknown, 3);
        assert_eq!(q.text, "1 + 1 = ?");
        assert_eq!(q.answer, 2);
    }
}
