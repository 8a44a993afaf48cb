//! Flat record types produced by a normalization run.
//!
//! Each type carries every canonical field for its entity kind,
//! including the fields denormalized from its parents, so a record is
//! self-describing without joins. Construction happens once, during
//! normalization; nothing mutates a record afterwards.

use std::error::Error;
use std::fmt::Display;

use serde_json::{Map, Value};

/// Rounding applied to vote percentages at serialization time.
/// Internally percentages keep full `f64` precision.
pub const PCT_PRECISION: i32 = 6;

/// Geographic level of a reporting unit.
///
/// The feed only distinguishes `state` from `subunit`; `subunit` is
/// resolved to `county` or `township` depending on the state (see
/// [`crate::maps`]). Synthesized New England rollups are `county`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Level {
    State,
    County,
    Township,
    District,
    Subunit,
    Other(String),
}

impl Level {
    pub fn from_raw(raw: &str) -> Level {
        match raw {
            "state" => Level::State,
            "county" => Level::County,
            "township" => Level::Township,
            "district" => Level::District,
            "subunit" => Level::Subunit,
            other => Level::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Level::State => "state",
            Level::County => "county",
            Level::Township => "township",
            Level::District => "district",
            Level::Subunit => "subunit",
            Level::Other(s) => s.as_str(),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that abort a normalization run.
///
/// Only structural problems abort: without a traversable shape there
/// is no meaningful partial output. Per-record anomalies (missing
/// optional fields, zero denominators) are always recovered locally.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum NormalizeError {
    /// The payload has no top-level `races` key.
    MissingRacesKey,
    /// A race entry is not a JSON object.
    MalformedRace { race_index: usize },
    /// A race entry carries no race id.
    MissingRaceId { race_index: usize },
}

impl Error for NormalizeError {}

impl Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::MissingRacesKey => {
                write!(f, "payload has no top-level 'races' key")
            }
            NormalizeError::MalformedRace { race_index } => {
                write!(f, "race at index {} is not an object", race_index)
            }
            NormalizeError::MissingRaceId { race_index } => {
                write!(f, "race at index {} has no 'raceID' field", race_index)
            }
        }
    }
}

/// Ordered serialization, the contract with tabular consumers.
///
/// Column names and their order are stable across calls and releases;
/// CSV writers depend on it byte-for-byte.
pub trait Record {
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    /// The record as a JSON object with keys in column order.
    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (k, v) in Self::COLUMNS.iter().zip(self.values()) {
            obj.insert(k.to_string(), v);
        }
        Value::Object(obj)
    }
}

fn opt(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::from(s.as_str()),
        None => Value::Null,
    }
}

fn opt_u64(v: &Option<u64>) -> Value {
    match v {
        Some(n) => Value::from(*n),
        None => Value::Null,
    }
}

fn round_pct(pct: f64) -> f64 {
    let scale = 10f64.powi(PCT_PRECISION);
    (pct * scale).round() / scale
}

/// One election date. The id is the date itself.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Election {
    pub id: String,
    pub electiondate: String,
    pub liveresults: bool,
    pub testresults: bool,
}

impl Record for Election {
    const COLUMNS: &'static [&'static str] =
        &["id", "electiondate", "liveresults", "testresults"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.electiondate.as_str()),
            Value::from(self.liveresults),
            Value::from(self.testresults),
        ]
    }
}

/// A single seat in a political geography within one election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Race {
    pub id: String,
    pub raceid: String,
    pub racetype: Option<String>,
    pub racetypeid: Option<String>,
    pub description: Option<String>,
    pub electiondate: String,
    pub initialization_data: bool,
    pub is_ballot_measure: bool,
    pub lastupdated: Option<String>,
    pub national: bool,
    pub officeid: Option<String>,
    pub officename: Option<String>,
    pub party: Option<String>,
    pub seatname: Option<String>,
    pub seatnum: Option<String>,
    pub statename: Option<String>,
    pub statepostal: Option<String>,
    pub test: bool,
    pub uncontested: bool,
    pub numrunoff: Option<u64>,
}

impl Record for Race {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "raceid",
        "racetype",
        "racetypeid",
        "description",
        "electiondate",
        "initialization_data",
        "is_ballot_measure",
        "lastupdated",
        "national",
        "officeid",
        "officename",
        "party",
        "seatname",
        "seatnum",
        "statename",
        "statepostal",
        "test",
        "uncontested",
        "numrunoff",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.raceid.as_str()),
            opt(&self.racetype),
            opt(&self.racetypeid),
            opt(&self.description),
            Value::from(self.electiondate.as_str()),
            Value::from(self.initialization_data),
            Value::from(self.is_ballot_measure),
            opt(&self.lastupdated),
            Value::from(self.national),
            opt(&self.officeid),
            opt(&self.officename),
            opt(&self.party),
            opt(&self.seatname),
            opt(&self.seatnum),
            opt(&self.statename),
            opt(&self.statepostal),
            Value::from(self.test),
            Value::from(self.uncontested),
            opt_u64(&self.numrunoff),
        ]
    }
}

/// A single level of reporting within one race: the state as a whole,
/// a county, a township or a district.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingUnit {
    pub id: Option<String>,
    pub reportingunitid: Option<String>,
    pub reportingunitname: Option<String>,
    pub description: Option<String>,
    pub electiondate: String,
    pub electtotal: u64,
    pub fipscode: Option<String>,
    pub initialization_data: bool,
    pub lastupdated: Option<String>,
    pub level: Option<Level>,
    pub national: bool,
    pub officeid: Option<String>,
    pub officename: Option<String>,
    pub precinctsreporting: u64,
    pub precinctsreportingpct: f64,
    pub precinctstotal: u64,
    pub raceid: String,
    pub racetype: Option<String>,
    pub racetypeid: Option<String>,
    pub seatname: Option<String>,
    pub seatnum: Option<String>,
    pub statename: Option<String>,
    pub statepostal: Option<String>,
    pub test: bool,
    pub uncontested: bool,
    /// `None` for uncontested races: no votes are tallied, which is
    /// distinct from a contested race with zero votes counted so far.
    pub votecount: Option<u64>,
}

impl Record for ReportingUnit {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "reportingunitid",
        "reportingunitname",
        "description",
        "electiondate",
        "electtotal",
        "fipscode",
        "initialization_data",
        "lastupdated",
        "level",
        "national",
        "officeid",
        "officename",
        "precinctsreporting",
        "precinctsreportingpct",
        "precinctstotal",
        "raceid",
        "racetype",
        "racetypeid",
        "seatname",
        "seatnum",
        "statename",
        "statepostal",
        "test",
        "uncontested",
        "votecount",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            opt(&self.id),
            opt(&self.reportingunitid),
            opt(&self.reportingunitname),
            opt(&self.description),
            Value::from(self.electiondate.as_str()),
            Value::from(self.electtotal),
            opt(&self.fipscode),
            Value::from(self.initialization_data),
            opt(&self.lastupdated),
            match &self.level {
                Some(l) => Value::from(l.as_str()),
                None => Value::Null,
            },
            Value::from(self.national),
            opt(&self.officeid),
            opt(&self.officename),
            Value::from(self.precinctsreporting),
            Value::from(self.precinctsreportingpct),
            Value::from(self.precinctstotal),
            Value::from(self.raceid.as_str()),
            opt(&self.racetype),
            opt(&self.racetypeid),
            opt(&self.seatname),
            opt(&self.seatnum),
            opt(&self.statename),
            opt(&self.statepostal),
            Value::from(self.test),
            Value::from(self.uncontested),
            opt_u64(&self.votecount),
        ]
    }
}

/// One candidate's (or ballot position's) results within one
/// reporting unit. The composite id is unique across the whole
/// election result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateReportingUnit {
    pub id: String,
    pub unique_id: String,
    pub raceid: String,
    pub racetype: Option<String>,
    pub racetypeid: Option<String>,
    pub ballotorder: Option<u64>,
    pub candidateid: Option<String>,
    pub description: Option<String>,
    pub delegatecount: u64,
    pub electiondate: String,
    pub electtotal: u64,
    pub electwon: u64,
    pub fipscode: Option<String>,
    pub first: Option<String>,
    pub incumbent: bool,
    pub initialization_data: bool,
    pub is_ballot_measure: bool,
    pub last: Option<String>,
    pub lastupdated: Option<String>,
    pub level: Option<Level>,
    pub national: bool,
    pub officeid: Option<String>,
    pub officename: Option<String>,
    pub party: Option<String>,
    pub polid: Option<String>,
    pub polnum: Option<String>,
    pub precinctsreporting: u64,
    pub precinctsreportingpct: f64,
    pub precinctstotal: u64,
    pub reportingunitid: Option<String>,
    pub reportingunitname: Option<String>,
    pub runoff: bool,
    pub seatname: Option<String>,
    pub seatnum: Option<String>,
    pub statename: Option<String>,
    pub statepostal: Option<String>,
    pub test: bool,
    pub uncontested: bool,
    pub votecount: u64,
    pub votepct: f64,
    pub winner: bool,
}

impl Record for CandidateReportingUnit {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "raceid",
        "racetype",
        "racetypeid",
        "ballotorder",
        "candidateid",
        "description",
        "delegatecount",
        "electiondate",
        "electtotal",
        "electwon",
        "fipscode",
        "first",
        "incumbent",
        "initialization_data",
        "is_ballot_measure",
        "last",
        "lastupdated",
        "level",
        "national",
        "officeid",
        "officename",
        "party",
        "polid",
        "polnum",
        "precinctsreporting",
        "precinctsreportingpct",
        "precinctstotal",
        "reportingunitid",
        "reportingunitname",
        "runoff",
        "seatname",
        "seatnum",
        "statename",
        "statepostal",
        "test",
        "uncontested",
        "votecount",
        "votepct",
        "winner",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.raceid.as_str()),
            opt(&self.racetype),
            opt(&self.racetypeid),
            opt_u64(&self.ballotorder),
            opt(&self.candidateid),
            opt(&self.description),
            Value::from(self.delegatecount),
            Value::from(self.electiondate.as_str()),
            Value::from(self.electtotal),
            Value::from(self.electwon),
            opt(&self.fipscode),
            opt(&self.first),
            Value::from(self.incumbent),
            Value::from(self.initialization_data),
            Value::from(self.is_ballot_measure),
            opt(&self.last),
            opt(&self.lastupdated),
            match &self.level {
                Some(l) => Value::from(l.as_str()),
                None => Value::Null,
            },
            Value::from(self.national),
            opt(&self.officeid),
            opt(&self.officename),
            opt(&self.party),
            opt(&self.polid),
            opt(&self.polnum),
            Value::from(self.precinctsreporting),
            Value::from(self.precinctsreportingpct),
            Value::from(self.precinctstotal),
            opt(&self.reportingunitid),
            opt(&self.reportingunitname),
            Value::from(self.runoff),
            opt(&self.seatname),
            opt(&self.seatnum),
            opt(&self.statename),
            opt(&self.statepostal),
            Value::from(self.test),
            Value::from(self.uncontested),
            Value::from(self.votecount),
            Value::from(round_pct(self.votepct)),
            Value::from(self.winner),
        ]
    }
}

/// A unique person across all races in one election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub unique_id: String,
    pub candidateid: Option<String>,
    pub ballotorder: Option<u64>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub party: Option<String>,
    pub polid: Option<String>,
    pub polnum: Option<String>,
}

impl Record for Candidate {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "candidateid",
        "ballotorder",
        "first",
        "last",
        "party",
        "polid",
        "polnum",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            opt(&self.candidateid),
            opt_u64(&self.ballotorder),
            opt(&self.first),
            opt(&self.last),
            opt(&self.party),
            opt(&self.polid),
            opt(&self.polnum),
        ]
    }
}

/// A unique ballot measure position in one election. `last` holds the
/// position text ("Yes", "For", ...), mirroring the candidate shape.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotMeasure {
    pub id: String,
    pub unique_id: String,
    pub candidateid: Option<String>,
    pub ballotorder: Option<u64>,
    pub description: Option<String>,
    pub electiondate: String,
    pub last: Option<String>,
    pub polid: Option<String>,
    pub polnum: Option<String>,
    pub seatname: Option<String>,
}

impl Record for BallotMeasure {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "candidateid",
        "ballotorder",
        "description",
        "electiondate",
        "last",
        "polid",
        "polnum",
        "seatname",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id.as_str()),
            opt(&self.candidateid),
            opt_u64(&self.ballotorder),
            opt(&self.description),
            Value::from(self.electiondate.as_str()),
            opt(&self.last),
            opt(&self.polid),
            opt(&self.polnum),
            opt(&self.seatname),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trip() {
        for raw in ["state", "county", "township", "district", "subunit"] {
            assert_eq!(Level::from_raw(raw).as_str(), raw);
        }
        assert_eq!(Level::from_raw("ward").as_str(), "ward");
    }

    #[test]
    fn votepct_is_rounded_at_serialization() {
        assert_eq!(round_pct(0.45652173913043476), 0.456522);
        assert_eq!(round_pct(0.0), 0.0);
        assert_eq!(round_pct(1.0), 1.0);
    }

    #[test]
    fn json_keys_follow_column_order() {
        let e = Election {
            id: "2015-11-03".to_string(),
            electiondate: "2015-11-03".to_string(),
            liveresults: true,
            testresults: false,
        };
        let js = e.to_json();
        let keys: Vec<&String> = js.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "electiondate", "liveresults", "testresults"]);
    }

    #[test]
    fn error_messages_name_the_missing_key() {
        let e = NormalizeError::MissingRaceId { race_index: 3 };
        assert!(format!("{}", e).contains("index 3"));
        assert!(format!("{}", NormalizeError::MissingRacesKey).contains("races"));
    }
}
