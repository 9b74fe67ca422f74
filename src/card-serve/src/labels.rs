use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Output classes of the card model, in training order
pub const CLASS_TABLE: [&str; 53] = [
    "ace of clubs",
    "ace of diamonds",
    "ace of hearts",
    "ace of spades",
    "eight of clubs",
    "eight of diamonds",
    "eight of hearts",
    "eight of spades",
    "five of clubs",
    "five of diamonds",
    "five of hearts",
    "five of spades",
    "four of clubs",
    "four of diamonds",
    "four of hearts",
    "four of spades",
    "jack of clubs",
    "jack of diamonds",
    "jack of hearts",
    "jack of spades",
    "joker",
    "king of clubs",
    "king of diamonds",
    "king of hearts",
    "king of spades",
    "nine of clubs",
    "nine of diamonds",
    "nine of hearts",
    "nine of spades",
    "queen of clubs",
    "queen of diamonds",
    "queen of hearts",
    "queen of spades",
    "seven of clubs",
    "seven of diamonds",
    "seven of hearts",
    "seven of spades",
    "six of clubs",
    "six of diamonds",
    "six of hearts",
    "six of spades",
    "ten of clubs",
    "ten of diamonds",
    "ten of hearts",
    "ten of spades",
    "three of clubs",
    "three of diamonds",
    "three of hearts",
    "three of spades",
    "two of clubs",
    "two of diamonds",
    "two of hearts",
    "two of spades",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Human readable card name
    pub label: String,

    /// Score of the winning class, within [0, 1]
    pub confidence: f64,
}

/// Index of the highest score. Ties go to the lowest index and NaN never wins.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |top| score > scores[top]) {
            best = Some(index);
        }
    }

    best.or_else(|| (!scores.is_empty()).then_some(0))
}

pub fn resolve(scores: &[f64]) -> Result<PredictionResult> {
    if scores.len() != CLASS_TABLE.len() {
        return Err(Error::ResponseShape(format!(
            "expected {} class scores, got {}",
            CLASS_TABLE.len(),
            scores.len()
        )));
    }

    // Non-empty, so argmax always yields an index
    let index = argmax(scores).unwrap_or(0);
    let confidence = scores[index];

    Ok(PredictionResult {
        label: CLASS_TABLE[index].to_owned(),
        confidence: if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores_with(index: usize, value: f64) -> Vec<f64> {
        let mut scores = vec![0.001; CLASS_TABLE.len()];
        scores[index] = value;
        scores
    }

    #[test]
    fn picks_highest_score() {
        let result = resolve(&scores_with(2, 0.91)).unwrap();
        assert_eq!(
            result,
            PredictionResult {
                label: "ace of hearts".to_owned(),
                confidence: 0.91
            }
        );
    }

    #[test]
    fn chosen_index_dominates_every_score() {
        let scores: Vec<f64> = (0..CLASS_TABLE.len())
            .map(|i| ((i * 37) % 53) as f64 / 53.0)
            .collect();
        let index = argmax(&scores).unwrap();

        assert!(scores.iter().all(|&s| scores[index] >= s));
        assert_eq!(resolve(&scores).unwrap().label, CLASS_TABLE[index]);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), Some(1));
    }

    #[test]
    fn nan_never_wins() {
        assert_eq!(argmax(&[f64::NAN, 0.3, f64::NAN, 0.4]), Some(3));
        assert_eq!(argmax(&[f64::NAN, f64::NAN]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn mismatched_length_is_an_error() {
        let err = resolve(&[0.1, 0.9]).unwrap_err();
        assert!(matches!(err, Error::ResponseShape(_)));
        assert_eq!(
            err.to_string(),
            "Unexpected inference response: expected 53 class scores, got 2"
        );

        assert!(resolve(&vec![0.0; 54]).is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(resolve(&scores_with(20, 4.2)).unwrap().confidence, 1.0);
        assert_eq!(resolve(&scores_with(20, 4.2)).unwrap().label, "joker");
    }
}
