use std::cmp::Ordering;
use tracing::warn;

use crate::engine::LeagueViews;
use crate::league_context::LeagueContext;
use crate::magic_number::Classification;
use crate::standings::{compare_records, TeamRecord, Wld};
use crate::teams::TeamRegistry;

// Cross-view consistency checks over a finished run. Returns one line per violation.
pub fn audit_views(views: &LeagueViews, registry: &TeamRegistry, context: &LeagueContext) -> Vec<String> {
    let mut violations = Vec::new();

    check_totals(views, &mut violations);
    check_ranking(views, &mut violations);
    check_head_to_head(views, registry, &mut violations);
    check_quotas(views, registry, &mut violations);
    check_magic(views, registry, context, &mut violations);

    if let Some(last) = views.timeline.last() {
        if last.standings != views.standings {
            violations.push(format!("timeline for {} disagrees with current standings", last.date));
        }
    }

    for v in &violations {
        warn!(violation = %v, "audit");
    }
    violations
}

fn check_totals(views: &LeagueViews, violations: &mut Vec<String>) {
    let total: Wld = views.standings.all().map(|s| Wld { wins: s.wins, losses: s.losses, draws: s.draws }).sum();

    if total.wins != total.losses {
        violations.push(format!("{} wins against {} losses", total.wins, total.losses));
    }
    if total.draws % 2 != 0 {
        violations.push(format!("odd draw total {}", total.draws));
    }
    if total.games() as usize != views.total_games * 2 {
        violations.push(format!("{} team games for {} games", total.games(), views.total_games));
    }
}

fn check_ranking(views: &LeagueViews, violations: &mut Vec<String>) {
    for group in &views.standings.groups {
        for (idx, s) in group.table.iter().enumerate() {
            if s.rank != idx + 1 {
                violations.push(format!("{}: rank {} at position {}", group.group, s.rank, idx + 1));
            }
            if s.games_behind < 0.0 {
                violations.push(format!("{}: team {} has negative games behind", group.group, s.team));
            }
        }

        if let Some(leader) = group.table.first() {
            if leader.games_behind != 0.0 {
                violations.push(format!("{}: leader {} is {} games behind", group.group, leader.team, leader.games_behind));
            }
        }

        for pair in group.table.windows(2) {
            let as_record = |s: &crate::standings::Standing| {
                let mut r = TeamRecord::new(s.team);
                r.total = Wld { wins: s.wins, losses: s.losses, draws: s.draws };
                r
            };
            if compare_records(&as_record(&pair[0]), &as_record(&pair[1])) != Ordering::Less {
                violations.push(format!("{}: {} is ranked above {} out of order", group.group, pair[0].team, pair[1].team));
            }
        }
    }
}

fn check_head_to_head(views: &LeagueViews, registry: &TeamRegistry, violations: &mut Vec<String>) {
    for team in registry.teams() {
        let mut row_total = Wld::default();

        for (opp, cell) in views.head_to_head.row(team.id) {
            row_total.merge(&cell.total);

            let Some(mirror) = views.head_to_head.cell(opp, team.id) else { continue };
            if cell.total.wins != mirror.total.losses || cell.total.draws != mirror.total.draws {
                violations.push(format!("head-to-head {} vs {} is not mirrored", team.code, registry.code(opp)));
            }
        }

        let games = views.standings.find(team.id).map_or(0, |s| s.games);
        if row_total.games() != games {
            violations.push(format!("{} head-to-head sums to {} of {} games", team.code, row_total.games(), games));
        }
    }
}

fn check_quotas(views: &LeagueViews, registry: &TeamRegistry, violations: &mut Vec<String>) {
    for a in 0..registry.len() {
        for b in (a + 1)..registry.len() {
            let Some(q) = views.schedule.quota(a, b) else { continue };
            if q.played <= q.expected && q.played + q.remaining != q.expected {
                violations.push(format!("{} vs {} quota does not add up", registry.code(a), registry.code(b)));
            }
        }
    }
}

fn check_magic(views: &LeagueViews, registry: &TeamRegistry, context: &LeagueContext, violations: &mut Vec<String>) {
    for scope in views.magic.scopes.iter().filter(|s| s.applicable) {
        let Some(group) = views.standings.group(&scope.group) else { continue };

        for t in &scope.teams {
            let Some(standing) = group.table.iter().find(|s| s.team == t.team) else { continue };

            for e in &t.per_target {
                let target = &group.table[e.target_rank - 1];
                let target_remaining = views.schedule.remaining(target.team);
                let ceiling = standing.wins + t.remaining;
                let eliminated = standing.rank > e.target_rank && ceiling < target.wins + target_remaining + 1;

                if (e.classification == Classification::Eliminated) != eliminated {
                    violations.push(format!("{} elimination for rank {} is inconsistent", registry.code(t.team), e.target_rank));
                }
                if (e.classification == Classification::Clinched) != (standing.rank <= e.target_rank) {
                    violations.push(format!("{} holds rank {} but is not marked clinched", registry.code(t.team), e.target_rank));
                }
                if eliminated && e.value != context.eliminated_sentinel {
                    violations.push(format!("{} eliminated without the sentinel", registry.code(t.team)));
                }
            }
        }
    }
}
