use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{LeagueError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueContext {
    pub season_games: u32,
    pub games_per_opponent: u32,
    pub inter_group_games_per_opponent: u32,
    pub pair_overrides: Vec<PairQuota>,

    pub playoff_spots: usize,
    pub home_field_rank: usize,
    pub magic_threshold: u32,
    pub eliminated_sentinel: u32,

    pub blowout_margin: u32,
    pub recent_form_window: usize,

    pub strict_home_marker: bool,   // Reject text lines without (H) instead of assuming team B is home
    pub exhibition_teams: Vec<String>,

    pub teams: Vec<TeamConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

// Fixed number of meetings for one pair, overriding the group-based quota
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairQuota {
    pub a: String,
    pub b: String,
    pub games: u32,
}

impl Default for LeagueContext {
    fn default() -> Self {
        Self::kbo()
    }
}

impl LeagueContext {
    // Ten clubs, everyone meets everyone 16 times.
    pub fn kbo() -> Self {
        Self {
            season_games: 144,
            games_per_opponent: 16,
            inter_group_games_per_opponent: 0,
            pair_overrides: Vec::new(),

            playoff_spots: 5,
            home_field_rank: 2,
            magic_threshold: 3,
            eliminated_sentinel: 999,

            blowout_margin: 7,
            recent_form_window: 10,

            strict_home_marker: false,
            exhibition_teams: vec!["나눔".to_string(), "드림".to_string()],

            teams: vec![
                team("HH",  "Hanwha Eagles",  None, &["한화", "한화 이글스", "Hanwha"]),
                team("LG",  "LG Twins",       None, &["LG 트윈스", "엘지"]),
                team("LT",  "Lotte Giants",   None, &["롯데", "롯데 자이언츠", "Lotte"]),
                team("SSG", "SSG Landers",    None, &["SSG 랜더스", "SK"]),
                team("KT",  "KT Wiz",         None, &["KT 위즈"]),
                team("KIA", "KIA Tigers",     None, &["기아", "KIA 타이거즈"]),
                team("SS",  "Samsung Lions",  None, &["삼성", "삼성 라이온즈", "Samsung"]),
                team("NC",  "NC Dinos",       None, &["NC 다이노스"]),
                team("DS",  "Doosan Bears",   None, &["두산", "두산 베어스", "Doosan"]),
                team("KW",  "Kiwoom Heroes",  None, &["키움", "키움 히어로즈", "Kiwoom"]),
            ],
        }
    }

    // Two leagues of six. 25 games per league opponent plus 3 per interleague opponent makes 143.
    pub fn npb() -> Self {
        let cl = Some("CL");
        let pl = Some("PL");

        Self {
            season_games: 143,
            games_per_opponent: 25,
            inter_group_games_per_opponent: 3,
            playoff_spots: 3,
            exhibition_teams: Vec::new(),
            teams: vec![
                team("G",  "Yomiuri Giants",               cl, &["요미우리", "Yomiuri", "Giants"]),
                team("T",  "Hanshin Tigers",               cl, &["한신", "Hanshin"]),
                team("D",  "Chunichi Dragons",             cl, &["중일", "Chunichi"]),
                team("S",  "Tokyo Yakult Swallows",        cl, &["야쿠르트", "Yakult"]),
                team("DB", "Yokohama DeNA BayStars",       cl, &["DeNA", "요코하마"]),
                team("C",  "Hiroshima Toyo Carp",          cl, &["히로시마", "Hiroshima"]),
                team("H",  "Fukuoka SoftBank Hawks",       pl, &["소프트뱅크", "SoftBank"]),
                team("M",  "Chiba Lotte Marines",          pl, &["로데", "롯데", "Lotte"]),
                team("B",  "Orix Buffaloes",               pl, &["오릭스", "Orix"]),
                team("E",  "Tohoku Rakuten Golden Eagles", pl, &["라쿠텐", "Rakuten"]),
                team("F",  "Hokkaido Nippon-Ham Fighters", pl, &["닛폰햄", "Nippon-Ham"]),
                team("L",  "Saitama Seibu Lions",          pl, &["세이부", "Seibu"]),
            ],
            ..Self::kbo()
        }
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "kbo" => Ok(Self::kbo()),
            "npb" => Ok(Self::npb()),
            other => Err(LeagueError::Config(format!("unknown preset '{other}'"))),
        }
    }

    // Fields missing from the file take the KBO defaults. Unreadable or invalid files are an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let context: LeagueContext = serde_json::from_str(&content)?;
        context.validate()?;

        info!(path = %path.display(), teams = context.teams.len(), "loaded league configuration");
        Ok(context)
    }

    pub fn validate(&self) -> Result<()> {
        if self.teams.is_empty() {
            return Err(LeagueError::Config("no teams configured".to_string()));
        }
        if self.playoff_spots == 0 || self.home_field_rank == 0 {
            return Err(LeagueError::Config("target ranks start at 1".to_string()));
        }
        if self.recent_form_window == 0 {
            return Err(LeagueError::Config("recent_form_window must be positive".to_string()));
        }
        Ok(())
    }

    pub fn is_exhibition(&self, name: &str) -> bool {
        let name = name.trim();
        self.exhibition_teams.iter().any(|t| t == name)
    }
}

fn team(code: &str, name: &str, group: Option<&str>, aliases: &[&str]) -> TeamConfig {
    TeamConfig {
        code: code.to_string(),
        name: name.to_string(),
        group: group.map(str::to_string),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}
