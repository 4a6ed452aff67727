//! Aggregate phase inference from peers' mirrored phases
//!
//! Used only when the authority's canonical phase has not reached this
//! process yet. Lobby reports do not vote.

use shared::GamePhase;

/// Per-phase counts of peers reporting that phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseVotes {
    pub starting: usize,
    pub playing: usize,
    pub ending: usize,
}

impl PhaseVotes {
    pub fn tally<I>(phases: I) -> Self
    where
        I: IntoIterator<Item = GamePhase>,
    {
        let mut votes = PhaseVotes::default();
        for phase in phases {
            match phase {
                GamePhase::Starting => votes.starting += 1,
                GamePhase::Playing => votes.playing += 1,
                GamePhase::Ending => votes.ending += 1,
                GamePhase::Lobby => {}
            }
        }
        votes
    }

    /// Starting wins ties against both others; Ending beats Playing on a
    /// tie but needs a strict lead over Starting.
    pub fn winner(&self) -> GamePhase {
        let PhaseVotes {
            starting: s,
            playing: p,
            ending: e,
        } = *self;

        if s == 0 && p == 0 && e == 0 {
            GamePhase::Lobby
        } else if s >= p && s >= e {
            GamePhase::Starting
        } else if e > s && e >= p {
            GamePhase::Ending
        } else {
            GamePhase::Playing
        }
    }
}

pub fn infer_phase<I>(phases: I) -> GamePhase
where
    I: IntoIterator<Item = GamePhase>,
{
    PhaseVotes::tally(phases).winner()
}
