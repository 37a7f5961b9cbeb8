//! Registry of narrator voices.
//!
//! Voice ids are stable identifiers (`af_heart`, `bm_george`, ...). The first
//! letter encodes the accent (`a` American, `b` British) and the second the
//! gender, which is also what the language tag is derived from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "UK")]
    Uk,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Uk => "UK",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "UK" | "GB" => Ok(Region::Uk),
            other => Err(format!("unknown region '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Gender::Female),
            "male" | "m" => Ok(Gender::Male),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Quality grade of a voice. Variants are declared worst to best so the
/// derived ordering can be used for "at least this good" filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    F,
    FPlus,
    DMinus,
    D,
    DPlus,
    CMinus,
    C,
    CPlus,
    BMinus,
    B,
    BPlus,
    AMinus,
    A,
    APlus,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::F => "F",
            Grade::FPlus => "F+",
            Grade::DMinus => "D-",
            Grade::D => "D",
            Grade::DPlus => "D+",
            Grade::CMinus => "C-",
            Grade::C => "C",
            Grade::CPlus => "C+",
            Grade::BMinus => "B-",
            Grade::B => "B",
            Grade::BPlus => "B+",
            Grade::AMinus => "A-",
            Grade::A => "A",
            Grade::APlus => "A+",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let grade = match s.trim().to_ascii_uppercase().as_str() {
            "F" => Grade::F,
            "F+" => Grade::FPlus,
            "D-" => Grade::DMinus,
            "D" => Grade::D,
            "D+" => Grade::DPlus,
            "C-" => Grade::CMinus,
            "C" => Grade::C,
            "C+" => Grade::CPlus,
            "B-" => Grade::BMinus,
            "B" => Grade::B,
            "B+" => Grade::BPlus,
            "A-" => Grade::AMinus,
            "A" => Grade::A,
            "A+" => Grade::APlus,
            other => return Err(format!("unknown grade '{}'", other)),
        };
        Ok(grade)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: &'static str,
    pub name: &'static str,
    pub region: Region,
    pub gender: Gender,
    pub grade: Grade,
    /// `a` for American English, `b` for British English.
    pub lang_code: char,
}

impl Voice {
    /// `"[US] af_heart (A) 🚺"`
    pub fn display_name(&self) -> String {
        let symbol = match self.gender {
            Gender::Female => "🚺",
            Gender::Male => "🚹",
        };
        format!("[{}] {} ({}) {}", self.region.as_str(), self.id, self.grade, symbol)
    }

    /// BCP 47 tag of the accent.
    pub fn language_tag(&self) -> &'static str {
        match self.lang_code {
            'b' => "en-GB",
            _ => "en-US",
        }
    }
}

macro_rules! voice {
    ($id:literal, $name:literal, $region:ident, $gender:ident, $grade:ident, $lang:literal) => {
        Voice {
            id: $id,
            name: $name,
            region: Region::$region,
            gender: Gender::$gender,
            grade: Grade::$grade,
            lang_code: $lang,
        }
    };
}

pub const DEFAULT_VOICE: &str = "af_heart";

static VOICES: [Voice; 28] = [
    // US English
    voice!("af_heart", "Heart", Us, Female, A, 'a'),
    voice!("af_bella", "Bella", Us, Female, AMinus, 'a'),
    voice!("af_nicole", "Nicole", Us, Female, BMinus, 'a'),
    voice!("af_alloy", "Alloy", Us, Female, C, 'a'),
    voice!("af_aoede", "Aoede", Us, Female, CPlus, 'a'),
    voice!("af_jessica", "Jessica", Us, Female, D, 'a'),
    voice!("af_kore", "Kore", Us, Female, CPlus, 'a'),
    voice!("af_nova", "Nova", Us, Female, C, 'a'),
    voice!("af_river", "River", Us, Female, D, 'a'),
    voice!("af_sarah", "Sarah", Us, Female, CPlus, 'a'),
    voice!("af_sky", "Sky", Us, Female, CMinus, 'a'),
    voice!("am_adam", "Adam", Us, Male, FPlus, 'a'),
    voice!("am_echo", "Echo", Us, Male, D, 'a'),
    voice!("am_eric", "Eric", Us, Male, D, 'a'),
    voice!("am_fenrir", "Fenrir", Us, Male, CPlus, 'a'),
    voice!("am_liam", "Liam", Us, Male, D, 'a'),
    voice!("am_michael", "Michael", Us, Male, CPlus, 'a'),
    voice!("am_onyx", "Onyx", Us, Male, D, 'a'),
    voice!("am_puck", "Puck", Us, Male, CPlus, 'a'),
    voice!("am_santa", "Santa", Us, Male, DMinus, 'a'),
    // UK English
    voice!("bf_alice", "Alice", Uk, Female, D, 'b'),
    voice!("bf_emma", "Emma", Uk, Female, BMinus, 'b'),
    voice!("bf_isabella", "Isabella", Uk, Female, C, 'b'),
    voice!("bf_lily", "Lily", Uk, Female, D, 'b'),
    voice!("bm_daniel", "Daniel", Uk, Male, D, 'b'),
    voice!("bm_fable", "Fable", Uk, Male, C, 'b'),
    voice!("bm_george", "George", Uk, Male, C, 'b'),
    voice!("bm_lewis", "Lewis", Uk, Male, DPlus, 'b'),
];

pub fn all() -> &'static [Voice] {
    &VOICES
}

pub fn lookup(id: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|v| v.id == id)
}

/// Resolves either a display name produced by [`Voice::display_name`] or a raw id.
pub fn from_display_name(name: &str) -> Option<&'static Voice> {
    let name = name.trim();
    lookup(name).or_else(|| VOICES.iter().find(|v| v.display_name() == name))
}

pub fn filter(region: Option<Region>, gender: Option<Gender>, min_grade: Option<Grade>) -> Vec<&'static Voice> {
    VOICES
        .iter()
        .filter(|v| region.map_or(true, |r| v.region == r))
        .filter(|v| gender.map_or(true, |g| v.gender == g))
        .filter(|v| min_grade.map_or(true, |g| v.grade >= g))
        .collect()
}
