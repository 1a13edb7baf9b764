use std::collections::BTreeMap;

use shared::domain::{Ballot, Position};

use crate::prompts::{REVIEW_HEADER, REVIEW_OPTIONS};

/// First position at or after `from` that has candidates to vote on.
pub(crate) fn next_open_position(ballot: &Ballot, from: usize) -> Option<usize> {
    ballot
        .positions
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, position)| !position.candidates.is_empty())
        .map(|(index, _)| index)
}

/// Closest position before `before` that has candidates.
pub(crate) fn previous_open_position(ballot: &Ballot, before: usize) -> Option<usize> {
    ballot.positions[..before.min(ballot.positions.len())]
        .iter()
        .rposition(|position| !position.candidates.is_empty())
}

pub(crate) fn position_prompt(position: &Position, index: usize) -> String {
    let mut text = format!("Vote for {}", position.title);
    for (number, candidate) in position.candidates.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", number + 1, candidate.name));
    }
    if index > 0 {
        text.push_str("\n0. Back");
    }
    text
}

/// Parses a 1-based menu choice in `1..=max`.
pub(crate) fn parse_choice(input: &str, max: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|choice| (1..=max).contains(choice))
}

/// Review screen for the recorded selections, or `None` when nothing on this
/// ballot has been chosen.
pub(crate) fn review_screen(ballot: &Ballot, selections: &BTreeMap<String, String>) -> Option<String> {
    let lines: Vec<String> = ballot
        .positions
        .iter()
        .filter_map(|position| {
            let candidate_id = selections.get(&position.id)?;
            let candidate = position.candidate(candidate_id)?;
            Some(format!("{}: {}", position.title, candidate.name))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "{REVIEW_HEADER}\n{}\n\n{REVIEW_OPTIONS}",
        lines.join("\n")
    ))
}

#[cfg(test)]
#[path = "tests/ballot_tests.rs"]
mod tests;
