use crate::models::answer::{Answer, UNANSWERED};
use crate::models::attempt::QuestionVersions;
use crate::models::question::Question;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub version: i32,
    pub selected_option: i32,
    /// `None` when the frozen version row could not be loaded.
    pub correct_option: Option<i32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptScore {
    pub correct: usize,
    pub total: usize,
    pub score: Decimal,
    pub answers: Vec<GradedAnswer>,
}

pub struct GradingService;

impl GradingService {
    /// Grades an attempt against the question content it froze.
    ///
    /// `questions` must hold the rows at the frozen versions; rows at any other
    /// version are ignored, so passing live content by mistake cannot leak into
    /// the result. Questions without an answer row count as unanswered.
    pub fn grade(
        frozen: &QuestionVersions,
        answers: &[Answer],
        questions: &[Question],
    ) -> AttemptScore {
        let mut graded = Vec::with_capacity(frozen.len());
        let mut correct = 0usize;

        for (&question_id, &version) in frozen {
            let selected_option = answers
                .iter()
                .find(|a| a.question_id == question_id)
                .map(|a| a.selected_option)
                .unwrap_or(UNANSWERED);

            let correct_option = questions
                .iter()
                .find(|q| q.id == question_id && q.version == version)
                .map(|q| q.correct_option);

            let is_correct =
                selected_option != UNANSWERED && Some(selected_option) == correct_option;
            if is_correct {
                correct += 1;
            }

            graded.push(GradedAnswer {
                question_id,
                version,
                selected_option,
                correct_option,
                is_correct,
            });
        }

        let total = frozen.len();
        AttemptScore {
            correct,
            total,
            score: Self::percentage(correct, total),
            answers: graded,
        }
    }

    /// `correct / total * 100` rounded to two decimals; zero when `total` is zero.
    pub fn percentage(correct: usize, total: usize) -> Decimal {
        if total == 0 {
            return Decimal::ZERO;
        }
        let ratio = Decimal::from(correct as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64);
        ratio.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}
