use serde::Serialize;
use std::collections::HashMap;

use crate::league_context::LeagueContext;

pub type TeamId = usize;

pub const DEFAULT_GROUP: &str = "league";

const SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub code: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(TeamId),
    Unknown { suggestion: Option<String> },
    Ambiguous(Vec<String>),
}

impl Lookup {
    pub fn found(&self) -> Option<TeamId> {
        match self {
            Lookup::Found(id) => Some(*id),
            _ => None,
        }
    }
}

// One canonical id per team. Every spelling seen in the wild goes through here before
// any counter is touched, so "한화", "Hanwha" and "HH" land on the same index.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    teams: Vec<Team>,
    lookup: HashMap<String, Vec<TeamId>>,
    groups: Vec<String>,
}

impl TeamRegistry {
    pub fn from_context(context: &LeagueContext) -> Self {
        let mut registry = Self {
            teams: Vec::new(),
            lookup: HashMap::new(),
            groups: Vec::new(),
        };

        for tc in &context.teams {
            let group = tc.group.clone().unwrap_or_else(|| DEFAULT_GROUP.to_string());
            if !registry.groups.contains(&group) {
                registry.groups.push(group.clone());
            }

            let id = registry.teams.len();
            registry.teams.push(Team {
                id,
                code: tc.code.clone(),
                name: tc.name.clone(),
                group,
            });

            let names = std::iter::once(&tc.code)
                .chain(std::iter::once(&tc.name))
                .chain(tc.aliases.iter());
            for name in names {
                registry.register(name, id);
            }
        }

        registry
    }

    fn register(&mut self, name: &str, id: TeamId) {
        let key = normalize_key(name);
        if key.is_empty() { return; }

        let ids = self.lookup.entry(key).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn lookup(&self, raw: &str) -> Lookup {
        let key = normalize_key(raw);

        match self.lookup.get(&key).map(Vec::as_slice) {
            Some([id]) => Lookup::Found(*id),
            Some(ids) if !ids.is_empty() => {
                Lookup::Ambiguous(ids.iter().map(|&id| self.teams[id].code.clone()).collect())
            }
            _ => Lookup::Unknown { suggestion: self.suggest(&key) },
        }
    }

    // Closest known spelling, only used to make the warning useful. Equal scores go to the earlier team.
    fn suggest(&self, key: &str) -> Option<String> {
        if key.is_empty() { return None; }

        let mut best: Option<(f64, TeamId)> = None;
        for (known, ids) in &self.lookup {
            let score = strsim::jaro_winkler(key, known);
            if score < SUGGESTION_THRESHOLD { continue; }

            let id = ids[0];
            let better = match best {
                None => true,
                Some((s, b)) => score > s || (score == s && id < b),
            };
            if better {
                best = Some((score, id));
            }
        }

        best.map(|(_, id)| self.teams[id].code.clone())
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn code(&self, id: TeamId) -> &str {
        &self.teams[id].code
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    // Members of a ranking scope, in registration order
    pub fn members(&self, group: &str) -> Vec<TeamId> {
        self.teams.iter().filter(|t| t.group == group).map(|t| t.id).collect()
    }

    pub fn same_group(&self, a: TeamId, b: TeamId) -> bool {
        self.teams[a].group == self.teams[b].group
    }
}

pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league_context::TeamConfig;

    #[test]
    fn test_aliases_resolve_to_one_id() {
        let registry = TeamRegistry::from_context(&LeagueContext::kbo());
        let hanwha = registry.lookup("HH");

        assert!(matches!(hanwha, Lookup::Found(_)));
        assert_eq!(registry.lookup("한화"), hanwha);
        assert_eq!(registry.lookup(" hanwha eagles "), hanwha);
        assert_eq!(registry.lookup("한화 이글스"), hanwha);
    }

    #[test]
    fn test_unknown_name_gets_suggestion() {
        let registry = TeamRegistry::from_context(&LeagueContext::kbo());

        match registry.lookup("Samsung Lion") {
            Lookup::Unknown { suggestion } => assert_eq!(suggestion.as_deref(), Some("SS")),
            other => panic!("unexpected lookup {other:?}"),
        }
        assert_eq!(registry.lookup("Yankees"), Lookup::Unknown { suggestion: None });
    }

    #[test]
    fn test_suggestion_tie_goes_to_earlier_team() {
        let club = |code: &str, name: &str| TeamConfig {
            code: code.to_string(),
            name: name.to_string(),
            group: None,
            aliases: Vec::new(),
        };
        let mut context = LeagueContext::kbo();
        context.teams = vec![club("TIGERB", "Beta Club"), club("TIGERA", "Alpha Club")];

        // fresh registries hash in a different order each time
        for _ in 0..20 {
            let registry = TeamRegistry::from_context(&context);
            assert_eq!(registry.lookup("TigerX"), Lookup::Unknown { suggestion: Some("TIGERB".to_string()) });
        }
    }

    #[test]
    fn test_shared_alias_is_ambiguous() {
        let mut context = LeagueContext::kbo();
        context.teams.push(TeamConfig {
            code: "LM".to_string(),
            name: "Lotte Marines".to_string(),
            group: None,
            aliases: vec!["롯데".to_string()],
        });
        let registry = TeamRegistry::from_context(&context);

        assert_eq!(registry.lookup("롯데"), Lookup::Ambiguous(vec!["LT".to_string(), "LM".to_string()]));
    }

    #[test]
    fn test_groups_keep_config_order() {
        let registry = TeamRegistry::from_context(&LeagueContext::npb());
        assert_eq!(registry.groups(), &["CL".to_string(), "PL".to_string()]);
        assert_eq!(registry.members("PL").len(), 6);
        assert!(!registry.same_group(0, 6));

        let kbo = TeamRegistry::from_context(&LeagueContext::kbo());
        assert_eq!(kbo.groups(), &[DEFAULT_GROUP.to_string()]);
    }
}
