use crate::state::game::Player;

/// Verdict after an attack has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Two or more players are still standing.
    Continue,
    /// Exactly one player is left; carries their index.
    Winner(usize),
    /// The last players were knocked out by the same attack.
    Draw,
}

impl Outcome {
    /// Whether the battle is over.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Continue)
    }
}

/// Decide whether the battle ends.
pub fn evaluate(players: &[Player]) -> Outcome {
    let mut active = players
        .iter()
        .enumerate()
        .filter(|(_, player)| !player.is_eliminated);

    match (active.next(), active.next()) {
        (Some(_), Some(_)) => Outcome::Continue,
        (Some((index, _)), None) => Outcome::Winner(index),
        _ => Outcome::Draw,
    }
}
