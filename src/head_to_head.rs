use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::data_loader::{Game, GameLog, Outcome};
use crate::standings::Wld;
use crate::teams::TeamId;

// One team's record against one opponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeadToHeadCell {
    pub total: Wld,
    pub home: Wld,
    pub away: Wld,
}

impl HeadToHeadCell {
    fn add(&mut self, outcome: Outcome, at_home: Option<bool>) {
        self.total.add(outcome);
        match at_home {
            Some(true) => self.home.add(outcome),
            Some(false) => self.away.add(outcome),
            None => {}
        }
    }

    fn merge(&mut self, other: &HeadToHeadCell) {
        self.total.merge(&other.total);
        self.home.merge(&other.home);
        self.away.merge(&other.away);
    }
}

// N x N, row is the team's perspective. Stored flat, diagonal never written.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadToHead {
    size: usize,
    cells: Vec<HeadToHeadCell>,
}

impl HeadToHead {
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![HeadToHeadCell::default(); size * size],
        }
    }

    pub fn cell(&self, team: TeamId, opponent: TeamId) -> Option<&HeadToHeadCell> {
        if team == opponent { return None; }
        self.cells.get(team * self.size + opponent)
    }

    // Every opponent cell for one team, diagonal excluded
    pub fn row(&self, team: TeamId) -> impl Iterator<Item = (TeamId, &HeadToHeadCell)> + '_ {
        (0..self.size).filter_map(move |opp| self.cell(team, opp).map(|c| (opp, c)))
    }

    pub fn record_game(&mut self, game: &Game) {
        let (a, b) = (game.team_a, game.team_b);
        let idx_a = a * self.size + b;
        let idx_b = b * self.size + a;

        self.cells[idx_a].add(game.outcome_for(a), game.is_home(a));
        self.cells[idx_b].add(game.outcome_for(b), game.is_home(b));
    }

    pub fn merge(&mut self, other: &HeadToHead) {
        debug_assert_eq!(self.size, other.size);

        for (mine, theirs) in self.cells.iter_mut().zip(&other.cells) {
            mine.merge(theirs);
        }
    }
}

// Additive merge keeps the parallel fold identical to a sequential pass
pub fn build_head_to_head(log: &GameLog, team_count: usize) -> HeadToHead {
    let games: Vec<&Game> = log.completed().collect();

    let matrix = games
        .par_iter()
        .fold(
            || HeadToHead::empty(team_count),
            |mut acc, g| {
                acc.record_game(g);
                acc
            },
        )
        .reduce(
            || HeadToHead::empty(team_count),
            |mut a, b| {
                a.merge(&b);
                a
            },
        );

    debug!(games = games.len(), teams = team_count, "head-to-head matrix built");
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::tests::{make_game, make_log};
    use crate::data_loader::Side;
    use crate::league_context::LeagueContext;
    use crate::standings::compute_standings;
    use crate::teams::TeamRegistry;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_cells_and_home_away() {
        let mut neutral = make_game("2025-04-03", 1, 2, 2, 0);
        neutral.home = None;
        let mut a_home = make_game("2025-04-04", 0, 1, 0, 1);
        a_home.home = Some(Side::A);

        let log = make_log(vec![
            make_game("2025-04-01", 0, 5, 3, 1),    // 1 at home
            make_game("2025-04-02", 1, 7, 2, 0),    // 0 at home
            neutral,
            a_home,
        ]);
        let h2h = build_head_to_head(&log, 10);

        let zero = h2h.cell(0, 1).unwrap();
        assert_eq!(zero.total, Wld { wins: 2, losses: 1, draws: 1 });
        assert_eq!(zero.away, Wld { wins: 1, losses: 0, draws: 0 });
        assert_eq!(zero.home, Wld { wins: 1, losses: 1, draws: 0 });

        let one = h2h.cell(1, 0).unwrap();
        assert_eq!(one.total, Wld { wins: 1, losses: 2, draws: 1 });
        assert_eq!(one.home, Wld { wins: 0, losses: 1, draws: 0 });
        assert_eq!(one.away, Wld { wins: 1, losses: 1, draws: 0 });

        assert!(h2h.cell(0, 0).is_none());
        assert_eq!(h2h.row(0).count(), 9);
    }

    #[test]
    fn test_antisymmetry_and_row_sums_on_random_season() {
        let context = LeagueContext::kbo();
        let registry = TeamRegistry::from_context(&context);
        let mut rng = StdRng::seed_from_u64(7);

        let mut games = Vec::new();
        for day in 1..=28 {
            for pair in 0..5 {
                let a = rng.random_range(0..10);
                let b = (a + 1 + rng.random_range(0..9)) % 10;
                let mut g = make_game(&format!("2025-04-{day:02}"), a, rng.random_range(0..10), rng.random_range(0..10), b);
                g.seq = pair;
                games.push(g);
            }
        }
        let log = make_log(games);
        let h2h = build_head_to_head(&log, registry.len());
        let standings = compute_standings(&log, &registry, &context);

        for a in 0..registry.len() {
            for (b, cell) in h2h.row(a) {
                let mirror = h2h.cell(b, a).unwrap();
                assert_eq!(cell.total.wins, mirror.total.losses);
                assert_eq!(cell.total.draws, mirror.total.draws);
            }

            let total: Wld = h2h.row(a).map(|(_, c)| c.total).sum();
            assert_eq!(total.games(), standings.find(a).unwrap().games);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let log = make_log(vec![
            make_game("2025-04-01", 0, 5, 3, 1),
            make_game("2025-04-01", 2, 1, 3, 3),
            make_game("2025-04-02", 3, 4, 4, 0),
            make_game("2025-04-02", 1, 0, 9, 2),
        ]);

        let mut sequential = HeadToHead::empty(4);
        for g in log.completed() {
            sequential.record_game(g);
        }

        assert_eq!(build_head_to_head(&log, 4), sequential);
    }
}
