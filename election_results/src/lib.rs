//! Normalization engine for AP election results.
//!
//! One raw JSON document describing a single election date goes in;
//! five flat, cross-referenced record lists come out: races, reporting
//! units, candidate reporting units, unique candidates and unique
//! ballot measures. The transformation is pure and single threaded:
//! no global state, no I/O, and the same payload always produces the
//! same output in the same order.

pub mod fields;
pub mod maps;
mod model;

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{
    ballot_measure_unique_id, candidate_unique_id, get_array, get_bool, get_f64,
    get_precincts_reporting_pct, get_str, get_u64, get_u64_opt, normalize_polid, pad_fipscode,
    RawObject,
};
pub use crate::model::*;

/// Reporting units whose name carries this marker are administrative
/// absentee-ballot buckets listed as townships. They are real results
/// but belong to no county and must not be rolled up.
const MAIL_BALLOT_MARKER: &str = "Mail Ballots C.D.";

/// The office id the feed uses for initiatives and referenda. It is
/// the only discriminator between people and ballot positions.
const BALLOT_MEASURE_OFFICE_ID: &str = "I";

/// Caller-supplied context for one normalization run.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionMeta {
    /// Election date, `YYYY-MM-DD`. Becomes the election id and is
    /// stamped onto every record.
    pub electiondate: String,
    pub liveresults: bool,
    pub testresults: bool,
    /// When non-empty, only these race ids are normalized.
    pub raceids: Vec<String>,
}

/// The five flat record lists for one election date, plus the
/// election record itself. List order is the flattening traversal
/// order: race order, then reporting unit order, then candidate order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResults {
    pub election: Election,
    pub races: Vec<Race>,
    pub reporting_units: Vec<ReportingUnit>,
    pub candidate_reporting_units: Vec<CandidateReportingUnit>,
    pub candidates: Vec<Candidate>,
    pub ballot_measures: Vec<BallotMeasure>,
}

// A reporting unit with its candidate children, before flattening.
struct UnitNode {
    unit: ReportingUnit,
    candidates: Vec<CandidateReportingUnit>,
}

struct RaceNode {
    race: Race,
    units: Vec<UnitNode>,
    // Children attached directly to the race in initialization mode.
    direct_candidates: Vec<CandidateReportingUnit>,
}

/// Normalizes one raw payload into flat record lists.
///
/// Structural problems (no `races` key, a race with no id) abort the
/// run; no partial output is produced. Anything else is recovered
/// locally with documented defaults.
pub fn normalize(meta: &ElectionMeta, payload: &Value) -> Result<NormalizedResults, NormalizeError> {
    let races_raw = payload
        .get("races")
        .and_then(Value::as_array)
        .ok_or(NormalizeError::MissingRacesKey)?;

    info!(
        "normalizing {} races for election {}",
        races_raw.len(),
        meta.electiondate
    );

    // A non-empty `candidates` key on the first race, with no nested
    // reporting units, means a pre-election initialization payload.
    let initialization_mode = races_raw
        .first()
        .and_then(Value::as_object)
        .map(|r| {
            !get_array(r, &["candidates"]).is_empty()
                && get_array(r, &["reportingunits", "reportingUnits"]).is_empty()
        })
        .unwrap_or(false);

    let mut race_nodes: Vec<RaceNode> = Vec::new();
    for (idx, raw) in races_raw.iter().enumerate() {
        let obj = raw
            .as_object()
            .ok_or(NormalizeError::MalformedRace { race_index: idx })?;
        let raceid = get_str(obj, &["raceid", "raceID"])
            .ok_or(NormalizeError::MissingRaceId { race_index: idx })?;
        if !meta.raceids.is_empty() && !meta.raceids.contains(&raceid) {
            debug!("skipping race {} (not in race id filter)", raceid);
            continue;
        }

        let mut race = race_from_raw(obj, raceid, initialization_mode, meta);
        let node = if initialization_mode {
            let direct_candidates = get_array(obj, &["candidates"])
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|c| candidate_from_raw(&race, None, c))
                .collect();
            RaceNode {
                race,
                units: Vec::new(),
                direct_candidates,
            }
        } else {
            let mut units: Vec<UnitNode> = get_array(obj, &["reportingunits", "reportingUnits"])
                .iter()
                .filter_map(Value::as_object)
                .map(|u| unit_node_from_raw(&race, u))
                .collect();
            set_state_fields_from_reportingunits(&mut race, &units);
            set_new_england_counties(&race, &mut units);
            RaceNode {
                race,
                units,
                direct_candidates: Vec::new(),
            }
        };
        race_nodes.push(node);
    }

    Ok(flatten(meta, race_nodes))
}

fn race_from_raw(
    obj: &RawObject,
    raceid: String,
    initialization_data: bool,
    meta: &ElectionMeta,
) -> Race {
    let statepostal = get_str(obj, &["statepostal", "statePostal"]);
    let statename = get_str(obj, &["statename", "stateName"]).or_else(|| {
        statepostal
            .as_deref()
            .and_then(maps::state_name)
            .map(str::to_string)
    });
    Race {
        id: raceid.clone(),
        raceid,
        racetype: get_str(obj, &["racetype", "raceType"]),
        racetypeid: get_str(obj, &["racetypeid", "raceTypeID"]),
        description: get_str(obj, &["description"]),
        electiondate: meta.electiondate.clone(),
        initialization_data,
        // Flipped during flattening if any child is a ballot measure.
        is_ballot_measure: false,
        lastupdated: get_str(obj, &["lastupdated", "lastUpdated"]),
        national: get_bool(obj, &["national"]),
        officeid: get_str(obj, &["officeid", "officeID"]),
        officename: get_str(obj, &["officename", "officeName"]),
        party: get_str(obj, &["party"]),
        seatname: get_str(obj, &["seatname", "seatName"]),
        seatnum: get_str(obj, &["seatnum", "seatNum"]),
        statename,
        statepostal,
        test: get_bool(obj, &["test"]),
        uncontested: get_bool(obj, &["uncontested"]),
        numrunoff: get_u64_opt(obj, &["numrunoff", "numRunoff"]),
    }
}

/// Builds a reporting unit and its candidate children, then runs the
/// per-unit aggregation (vote count, vote shares).
fn unit_node_from_raw(race: &Race, obj: &RawObject) -> UnitNode {
    let unit = reporting_unit_from_raw(race, obj);
    let candidates = get_array(obj, &["candidates"])
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|c| candidate_from_raw(race, Some(&unit), c))
        .collect();
    let mut node = UnitNode { unit, candidates };
    set_votecount(&mut node);
    set_candidate_votepct(&mut node);
    node
}

fn reporting_unit_from_raw(race: &Race, obj: &RawObject) -> ReportingUnit {
    // State attribution comes from the unit itself, never from the
    // race: a national race spans many states.
    let statepostal = get_str(obj, &["statepostal", "statePostal"]);
    let statename = get_str(obj, &["statename", "stateName"]).or_else(|| {
        statepostal
            .as_deref()
            .and_then(maps::state_name)
            .map(str::to_string)
    });

    let level = set_level(
        get_str(obj, &["level"]).map(|l| Level::from_raw(&l)),
        statepostal.as_deref(),
    );
    let reportingunitid = set_reportingunitid(
        get_str(obj, &["reportingunitid", "reportingunitID"]),
        &level,
        statepostal.as_deref(),
    );

    ReportingUnit {
        id: reportingunitid.clone(),
        reportingunitid,
        reportingunitname: get_str(obj, &["reportingunitname", "reportingunitName"]),
        description: race.description.clone(),
        electiondate: race.electiondate.clone(),
        electtotal: get_u64(obj, &["electtotal", "electTotal"]),
        fipscode: pad_fipscode(get_str(obj, &["fipscode", "fipsCode"])),
        initialization_data: race.initialization_data,
        lastupdated: get_str(obj, &["lastupdated", "lastUpdated"])
            .or_else(|| race.lastupdated.clone()),
        level,
        national: race.national,
        officeid: race.officeid.clone(),
        officename: race.officename.clone(),
        precinctsreporting: get_u64(obj, &["precinctsreporting", "precinctsReporting"]),
        precinctsreportingpct: get_precincts_reporting_pct(obj),
        precinctstotal: get_u64(obj, &["precinctstotal", "precinctsTotal"]),
        raceid: race.raceid.clone(),
        racetype: race.racetype.clone(),
        racetypeid: race.racetypeid.clone(),
        seatname: race.seatname.clone(),
        seatnum: race.seatnum.clone(),
        statename,
        statepostal,
        test: race.test,
        uncontested: race.uncontested,
        votecount: None,
    }
}

/// Resolves the generic `subunit` tag: township in the New England
/// states, county everywhere else.
fn set_level(level: Option<Level>, statepostal: Option<&str>) -> Option<Level> {
    match level {
        Some(Level::Subunit) => {
            if statepostal.map(maps::is_new_england).unwrap_or(false) {
                Some(Level::Township)
            } else {
                Some(Level::County)
            }
        }
        other => other,
    }
}

/// Reporting unit id policy, the most defensive of the historical
/// variants: state-level units with no id are synthesized as
/// `state-{postal}-1` (unique even in a multi-state national payload),
/// and every id carried by the feed is prefixed with its level, since
/// the vendor recycles raw ids across levels.
fn set_reportingunitid(
    raw: Option<String>,
    level: &Option<Level>,
    statepostal: Option<&str>,
) -> Option<String> {
    match raw {
        Some(id) => match level {
            Some(l) => Some(format!("{}-{}", l.as_str(), id)),
            None => Some(id),
        },
        None => {
            if *level == Some(Level::State) {
                Some(format!("state-{}-1", statepostal.unwrap_or("")))
            } else {
                None
            }
        }
    }
}

/// Decodes the winner marker. `"X"` marks an outright winner; `"R"`
/// marks a winner advancing to a runoff. Previously exported data
/// carries plain booleans instead; a runoff record is always also a
/// winner.
fn decode_winner(obj: &RawObject) -> (bool, bool) {
    match obj.get("winner") {
        Some(Value::String(s)) if s == "X" => (true, false),
        Some(Value::String(s)) if s == "R" => (true, true),
        Some(Value::Bool(w)) => {
            let runoff = get_bool(obj, &["runoff"]);
            (*w || runoff, runoff)
        }
        _ => (false, false),
    }
}

/// Builds one candidate reporting unit. `unit` is `None` in
/// initialization mode, where candidates hang directly off the race.
///
/// Returns `None` for a person with neither `polid` nor `polnum`:
/// there is no stable identity to assign and a degenerate id would
/// corrupt deduplication. The record is logged and skipped; the run
/// continues.
fn candidate_from_raw(
    race: &Race,
    unit: Option<&ReportingUnit>,
    obj: &RawObject,
) -> Option<CandidateReportingUnit> {
    let is_ballot_measure = race.officeid.as_deref() == Some(BALLOT_MEASURE_OFFICE_ID);
    let candidateid = get_str(obj, &["candidateid", "candidateID"]);
    let polid = normalize_polid(get_str(obj, &["polid", "polID"]));
    let polnum = get_str(obj, &["polnum", "polNum"]);

    // Ballot measures have no meaningful polid; the raw candidate id
    // is their per-race identity.
    let unique_id = if is_ballot_measure {
        candidateid.clone()
    } else {
        candidate_unique_id(polid.as_deref(), polnum.as_deref())
    };
    let unique_id = match unique_id {
        Some(u) => u,
        None => {
            warn!(
                "race {}: candidate {:?} {:?} (candidateid {:?}) has no polid or polnum; skipping",
                race.raceid,
                get_str(obj, &["first"]),
                get_str(obj, &["last"]),
                candidateid
            );
            return None;
        }
    };

    let (winner, runoff) = decode_winner(obj);
    let reportingunitid = unit.and_then(|u| u.reportingunitid.clone());
    let id = match &reportingunitid {
        Some(ruid) => format!("{}-{}-{}", race.raceid, unique_id, ruid),
        None => format!("{}-{}", race.raceid, unique_id),
    };

    let statepostal = unit
        .and_then(|u| u.statepostal.clone())
        .or_else(|| race.statepostal.clone());
    let statename = unit.and_then(|u| u.statename.clone()).or_else(|| {
        statepostal
            .as_deref()
            .and_then(maps::state_name)
            .map(str::to_string)
    });

    Some(CandidateReportingUnit {
        id,
        unique_id,
        raceid: race.raceid.clone(),
        racetype: race.racetype.clone(),
        racetypeid: race.racetypeid.clone(),
        ballotorder: get_u64_opt(obj, &["ballotorder", "ballotOrder"]),
        candidateid,
        description: race.description.clone(),
        delegatecount: get_u64(obj, &["delegatecount", "delegateCount"]),
        electiondate: race.electiondate.clone(),
        electtotal: unit.map(|u| u.electtotal).unwrap_or(0),
        electwon: get_u64(obj, &["electwon", "electWon"]),
        fipscode: unit.and_then(|u| u.fipscode.clone()),
        first: get_str(obj, &["first"]),
        incumbent: get_bool(obj, &["incumbent"]),
        initialization_data: race.initialization_data,
        is_ballot_measure,
        last: get_str(obj, &["last"]),
        lastupdated: unit
            .and_then(|u| u.lastupdated.clone())
            .or_else(|| race.lastupdated.clone()),
        level: unit.and_then(|u| u.level.clone()),
        national: race.national,
        officeid: race.officeid.clone(),
        officename: race.officename.clone(),
        party: get_str(obj, &["party"]),
        polid,
        polnum,
        precinctsreporting: unit.map(|u| u.precinctsreporting).unwrap_or(0),
        precinctsreportingpct: unit.map(|u| u.precinctsreportingpct).unwrap_or(0.0),
        precinctstotal: unit.map(|u| u.precinctstotal).unwrap_or(0),
        reportingunitid,
        reportingunitname: unit.and_then(|u| u.reportingunitname.clone()),
        runoff,
        seatname: race.seatname.clone(),
        seatnum: race.seatnum.clone(),
        statename,
        statepostal,
        test: race.test,
        uncontested: race.uncontested,
        votecount: get_u64(obj, &["votecount", "voteCount"]),
        votepct: get_f64(obj, &["votepct", "votePct"]),
        winner,
    })
}

/// A unit's total is the sum of its direct children at the unit's own
/// reporting level. Mixing levels into one sum double-counts, which
/// is why the filter is part of the contract. Uncontested races have
/// no tally at all: the count is `None`, not zero.
fn set_votecount(node: &mut UnitNode) {
    if node.unit.uncontested {
        node.unit.votecount = None;
        return;
    }
    let total = node
        .candidates
        .iter()
        .filter(|c| c.level == node.unit.level)
        .map(|c| c.votecount)
        .sum();
    node.unit.votecount = Some(total);
}

/// Vote share of each matching-level child. A zero denominator (no
/// votes reported yet) leaves every share at 0.0; it never raises.
fn set_candidate_votepct(node: &mut UnitNode) {
    if node.unit.uncontested {
        return;
    }
    let total = node.unit.votecount.unwrap_or(0);
    for c in node
        .candidates
        .iter_mut()
        .filter(|c| c.level == node.unit.level)
    {
        c.votepct = if total == 0 {
            0.0
        } else {
            c.votecount as f64 / total as f64
        };
    }
}

/// Races in a national payload often carry no state attribution of
/// their own; it is copied up from the last reporting unit child.
fn set_state_fields_from_reportingunits(race: &mut Race, units: &[UnitNode]) {
    if let Some(postal) = units.last().and_then(|n| n.unit.statepostal.clone()) {
        race.statename = maps::state_name(&postal)
            .map(str::to_string)
            .or_else(|| race.statename.clone());
        race.statepostal = Some(postal);
    }
}

fn precinct_pct(reporting: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        reporting as f64 / total as f64
    }
}

/// New England states report by township; county-level consumers
/// expect counties. For every county FIPS code in the state's table,
/// synthesize one county unit by summing its township children,
/// skipping the mail-ballot buckets. A county with no qualifying
/// townships (say, entirely vote by mail) simply produces nothing.
fn set_new_england_counties(race: &Race, units: &mut Vec<UnitNode>) {
    let postal = match race.statepostal.as_deref() {
        Some(p) => p,
        None => return,
    };
    let counties = match maps::new_england_counties(postal) {
        Some(c) => c,
        None => return,
    };

    let mut synthesized: Vec<UnitNode> = Vec::new();
    for (fips, county_name) in counties {
        let townships: Vec<&UnitNode> = units
            .iter()
            .filter(|n| {
                n.unit.level == Some(Level::Township)
                    && !n
                        .unit
                        .reportingunitname
                        .as_deref()
                        .unwrap_or("")
                        .contains(MAIL_BALLOT_MARKER)
                    && n.unit.fipscode.as_deref() == Some(fips)
            })
            .collect();
        if townships.is_empty() {
            continue;
        }

        let county_ruid = format!("county-{}-{}", postal, fips);
        debug!(
            "race {}: rolling up {} townships into {}",
            race.raceid,
            townships.len(),
            county_ruid
        );

        let mut unit = townships[0].unit.clone();
        unit.level = Some(Level::County);
        unit.statepostal = Some(postal.to_string());
        unit.statename = maps::state_name(postal).map(str::to_string);
        unit.reportingunitname = Some(county_name.to_string());
        unit.reportingunitid = Some(county_ruid.clone());
        unit.id = Some(county_ruid.clone());
        unit.precinctstotal = townships.iter().map(|n| n.unit.precinctstotal).sum();
        unit.precinctsreporting = townships.iter().map(|n| n.unit.precinctsreporting).sum();
        unit.precinctsreportingpct = precinct_pct(unit.precinctsreporting, unit.precinctstotal);

        // Candidate totals are keyed by unique_id, not raw candidate
        // id: a candidate may carry different raw ids across
        // sub-jurisdictions.
        let mut order: Vec<String> = Vec::new();
        let mut by_unique_id: HashMap<String, CandidateReportingUnit> = HashMap::new();
        for node in &townships {
            for cru in &node.candidates {
                match by_unique_id.get_mut(&cru.unique_id) {
                    None => {
                        let mut c = cru.clone();
                        c.level = Some(Level::County);
                        c.reportingunitid = Some(county_ruid.clone());
                        c.reportingunitname = Some(county_name.to_string());
                        c.fipscode = Some(fips.to_string());
                        c.id = format!("{}-{}-{}", c.raceid, c.unique_id, county_ruid);
                        order.push(c.unique_id.clone());
                        by_unique_id.insert(c.unique_id.clone(), c);
                    }
                    Some(d) => {
                        d.votecount += cru.votecount;
                        d.precinctstotal += cru.precinctstotal;
                        d.precinctsreporting += cru.precinctsreporting;
                    }
                }
            }
        }
        let mut candidates: Vec<CandidateReportingUnit> = order
            .iter()
            .filter_map(|uid| by_unique_id.remove(uid))
            .collect();
        for c in candidates.iter_mut() {
            c.precinctsreportingpct = precinct_pct(c.precinctsreporting, c.precinctstotal);
        }

        let mut node = UnitNode { unit, candidates };
        set_votecount(&mut node);
        set_candidate_votepct(&mut node);
        synthesized.push(node);
    }
    units.extend(synthesized);
}

/// Flattens the per-race trees into independent record lists and runs
/// the deduplication pass.
fn flatten(meta: &ElectionMeta, race_nodes: Vec<RaceNode>) -> NormalizedResults {
    let mut races: Vec<Race> = Vec::new();
    let mut reporting_units: Vec<ReportingUnit> = Vec::new();
    let mut candidate_reporting_units: Vec<CandidateReportingUnit> = Vec::new();

    for node in race_nodes {
        let mut race = node.race;
        for unit_node in node.units {
            for cru in unit_node.candidates {
                if cru.is_ballot_measure {
                    race.is_ballot_measure = true;
                }
                candidate_reporting_units.push(cru);
            }
            reporting_units.push(unit_node.unit);
        }
        for cru in node.direct_candidates {
            if cru.is_ballot_measure {
                race.is_ballot_measure = true;
            }
            candidate_reporting_units.push(cru);
        }
        races.push(race);
    }

    let (candidates, ballot_measures) = get_uniques(&meta.electiondate, &candidate_reporting_units);

    info!(
        "normalized {} races, {} reporting units, {} candidate reporting units, {} candidates, {} ballot measures",
        races.len(),
        reporting_units.len(),
        candidate_reporting_units.len(),
        candidates.len(),
        ballot_measures.len()
    );

    NormalizedResults {
        election: Election {
            id: meta.electiondate.clone(),
            electiondate: meta.electiondate.clone(),
            liveresults: meta.liveresults,
            testresults: meta.testresults,
        },
        races,
        reporting_units,
        candidate_reporting_units,
        candidates,
        ballot_measures,
    }
}

/// Collapses the flat candidate reporting unit list into unique
/// candidates and ballot measures. First seen wins, per raw candidate
/// id, in traversal order; a later record whose unique id was already
/// emitted under a different raw id is dropped so that unique ids
/// stay unique.
pub fn get_uniques(
    electiondate: &str,
    candidate_reporting_units: &[CandidateReportingUnit],
) -> (Vec<Candidate>, Vec<BallotMeasure>) {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut ballot_measures: Vec<BallotMeasure> = Vec::new();
    let mut seen_candidate_ids: HashMap<String, ()> = HashMap::new();
    let mut seen_measure_ids: HashMap<String, ()> = HashMap::new();
    let mut seen_unique_ids: HashMap<String, ()> = HashMap::new();

    for cru in candidate_reporting_units {
        let raw_key = cru
            .candidateid
            .clone()
            .unwrap_or_else(|| cru.unique_id.clone());
        if cru.is_ballot_measure {
            if seen_measure_ids.insert(raw_key, ()).is_some() {
                continue;
            }
            let unique_id = ballot_measure_unique_id(
                electiondate,
                cru.candidateid.as_deref().unwrap_or(&cru.unique_id),
            );
            ballot_measures.push(BallotMeasure {
                id: unique_id.clone(),
                unique_id,
                candidateid: cru.candidateid.clone(),
                ballotorder: cru.ballotorder,
                description: cru.description.clone(),
                electiondate: electiondate.to_string(),
                last: cru.last.clone(),
                polid: cru.polid.clone(),
                polnum: cru.polnum.clone(),
                seatname: cru.seatname.clone(),
            });
        } else {
            if seen_candidate_ids.insert(raw_key, ()).is_some() {
                continue;
            }
            if seen_unique_ids.insert(cru.unique_id.clone(), ()).is_some() {
                debug!(
                    "candidate {} already emitted under a different candidateid; dropping",
                    cru.unique_id
                );
                continue;
            }
            candidates.push(Candidate {
                id: cru.unique_id.clone(),
                unique_id: cru.unique_id.clone(),
                candidateid: cru.candidateid.clone(),
                ballotorder: cru.ballotorder,
                first: cru.first.clone(),
                last: cru.last.clone(),
                party: cru.party.clone(),
                polid: cru.polid.clone(),
                polnum: cru.polnum.clone(),
            });
        }
    }
    (candidates, ballot_measures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn meta() -> ElectionMeta {
        ElectionMeta {
            electiondate: "2015-11-03".to_string(),
            liveresults: true,
            testresults: false,
            raceids: Vec::new(),
        }
    }

    // One race, one state-level reporting unit, three candidates with
    // a known total. Mirrors the 2015 Kentucky governor's race.
    fn ky_governor_payload() -> Value {
        json!({
            "electionDate": "2015-11-03",
            "races": [
                {
                    "raceID": "18525",
                    "raceType": "General",
                    "raceTypeID": "G",
                    "officeID": "G",
                    "officeName": "Governor",
                    "national": true,
                    "lastUpdated": "2015-11-04T14:38:39Z",
                    "reportingUnits": [
                        {
                            "statePostal": "KY",
                            "stateName": "Kentucky",
                            "level": "state",
                            "lastUpdated": "2015-11-04T14:38:39Z",
                            "precinctsReporting": 3661,
                            "precinctsTotal": 3661,
                            "precinctsReportingPct": 100.0,
                            "candidates": [
                                {
                                    "first": "Matt",
                                    "last": "Bevin",
                                    "party": "GOP",
                                    "candidateID": "5295",
                                    "polID": "63424",
                                    "ballotOrder": 2,
                                    "polNum": "20103",
                                    "voteCount": 511771,
                                    "winner": "X"
                                },
                                {
                                    "first": "Jack",
                                    "last": "Conway",
                                    "party": "Dem",
                                    "candidateID": "5266",
                                    "polID": "204",
                                    "ballotOrder": 1,
                                    "polNum": "19601",
                                    "voteCount": 426944
                                },
                                {
                                    "first": "Drew",
                                    "last": "Curtis",
                                    "party": "Una",
                                    "candidateID": "5293",
                                    "polID": "0",
                                    "ballotOrder": 3,
                                    "polNum": "20102",
                                    "voteCount": 35629
                                }
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn ky_governor_vote_sums_and_shares() {
        let res = normalize(&meta(), &ky_governor_payload()).unwrap();
        assert_eq!(res.races.len(), 1);
        assert_eq!(res.reporting_units.len(), 1);
        assert_eq!(res.candidate_reporting_units.len(), 3);

        let total = 511771 + 426944 + 35629;
        let unit = &res.reporting_units[0];
        assert_eq!(unit.votecount, Some(total));
        assert_eq!(unit.level, Some(Level::State));
        assert_eq!(unit.reportingunitid.as_deref(), Some("state-KY-1"));

        for cru in &res.candidate_reporting_units {
            let expected = cru.votecount as f64 / total as f64;
            assert!((cru.votepct - expected).abs() < 1e-12);
            assert!(cru.votepct > 0.0 && cru.votepct <= 1.0);
        }
    }

    #[test]
    fn ky_governor_identities() {
        let res = normalize(&meta(), &ky_governor_payload()).unwrap();
        let crus = &res.candidate_reporting_units;
        assert_eq!(crus[0].unique_id, "polid-63424");
        assert_eq!(crus[1].unique_id, "polid-204");
        // polid "0" means no national id; falls back to polnum.
        assert_eq!(crus[2].unique_id, "polnum-20102");
        assert_eq!(crus[1].id, "18525-polid-204-state-KY-1");

        assert!(crus[0].winner);
        assert!(!crus[0].runoff);
        assert!(!crus[1].winner);
    }

    #[test]
    fn ky_governor_race_fields() {
        let res = normalize(&meta(), &ky_governor_payload()).unwrap();
        let race = &res.races[0];
        assert_eq!(race.raceid, "18525");
        assert_eq!(race.statepostal.as_deref(), Some("KY"));
        assert_eq!(race.statename.as_deref(), Some("Kentucky"));
        assert!(!race.initialization_data);
        assert!(!race.is_ballot_measure);

        assert_eq!(res.candidates.len(), 3);
        assert!(res.ballot_measures.is_empty());
        assert_eq!(res.candidates[0].id, "polid-63424");
    }

    #[test]
    fn initialization_payload_bypasses_reporting_units() {
        let payload = json!({
            "races": [
                {
                    "raceID": "12000",
                    "raceType": "Primary",
                    "officeID": "P",
                    "officeName": "President",
                    "statePostal": "IA",
                    "candidates": [
                        {"first": "A", "last": "Alpha", "candidateID": "1", "polID": "11", "polNum": "101", "ballotOrder": 1},
                        {"first": "B", "last": "Beta", "candidateID": "2", "polID": "12", "polNum": "102", "ballotOrder": 2},
                        {"first": "C", "last": "Gamma", "candidateID": "3", "polID": "0", "polNum": "103", "ballotOrder": 3}
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        assert_eq!(res.races.len(), 1);
        assert!(res.races[0].initialization_data);
        assert!(res.reporting_units.is_empty());
        assert_eq!(res.candidate_reporting_units.len(), 3);
        for cru in &res.candidate_reporting_units {
            assert!(cru.initialization_data);
            assert_eq!(cru.level, None);
            assert_eq!(cru.votecount, 0);
            assert_eq!(cru.statepostal.as_deref(), Some("IA"));
        }
        assert_eq!(res.candidate_reporting_units[2].unique_id, "polnum-103");
        assert_eq!(res.candidate_reporting_units[0].id, "12000-polid-11");
    }

    #[test]
    fn ballot_measure_race_produces_measures_not_candidates() {
        let payload = json!({
            "races": [
                {
                    "raceID": "40999",
                    "raceType": "General",
                    "officeID": "I",
                    "officeName": "Ballot Issue",
                    "description": "Legalize rollups",
                    "seatName": "Measure 1",
                    "reportingUnits": [
                        {
                            "statePostal": "CO",
                            "level": "state",
                            "candidates": [
                                {"last": "Yes", "candidateID": "6527", "polID": "0", "polNum": "40001", "ballotOrder": 1, "voteCount": 900},
                                {"last": "No", "candidateID": "6528", "polID": "0", "polNum": "40002", "ballotOrder": 2, "voteCount": 100}
                            ]
                        }
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        assert!(res.races[0].is_ballot_measure);
        for cru in &res.candidate_reporting_units {
            assert!(cru.is_ballot_measure);
        }
        // Measure identity is the raw candidate id, scoped by date.
        assert_eq!(res.candidate_reporting_units[0].unique_id, "6527");
        assert!(res.candidates.is_empty());
        assert_eq!(res.ballot_measures.len(), 2);
        assert_eq!(res.ballot_measures[0].id, "2015-11-03-6527");
        assert_eq!(res.ballot_measures[0].last.as_deref(), Some("Yes"));
        assert_eq!(res.ballot_measures[1].id, "2015-11-03-6528");
        assert!((res.candidate_reporting_units[0].votepct - 0.9).abs() < 1e-12);
    }

    fn ri_township(name: &str, fips: &str, precincts: u64, reporting: u64, votes: [u64; 2]) -> Value {
        json!({
            "statePostal": "RI",
            "level": "subunit",
            "reportingunitID": format!("ru-{}-{}", fips, name.replace(' ', "-")),
            "reportingunitName": name,
            "fipsCode": fips,
            "precinctsReporting": reporting,
            "precinctsTotal": precincts,
            "precinctsReportingPct": 100.0,
            "candidates": [
                {"first": "Pat", "last": "Quinn", "candidateID": "901", "polID": "7001", "polNum": "501", "ballotOrder": 1, "voteCount": votes[0]},
                {"first": "Lee", "last": "Moss", "candidateID": "902", "polID": "7002", "polNum": "502", "ballotOrder": 2, "voteCount": votes[1]}
            ]
        })
    }

    fn ri_payload() -> Value {
        json!({
            "races": [
                {
                    "raceID": "30111",
                    "raceType": "General",
                    "raceTypeID": "G",
                    "officeID": "S",
                    "officeName": "U.S. Senate",
                    "reportingUnits": [
                        {
                            "statePostal": "RI",
                            "level": "state",
                            "precinctsReporting": 12,
                            "precinctsTotal": 12,
                            "precinctsReportingPct": 100.0,
                            "candidates": [
                                {"first": "Pat", "last": "Quinn", "candidateID": "901", "polID": "7001", "polNum": "501", "ballotOrder": 1, "voteCount": 1200, "winner": "X"},
                                {"first": "Lee", "last": "Moss", "candidateID": "902", "polID": "7002", "polNum": "502", "ballotOrder": 2, "voteCount": 800}
                            ]
                        },
                        ri_township("Providence", "44007", 6, 6, [400, 300]),
                        ri_township("Cranston", "44007", 4, 4, [500, 200]),
                        ri_township("Warwick", "44003", 2, 2, [300, 300]),
                        ri_township("Mail Ballots C.D. 1", "44007", 1, 1, [9999, 9999])
                    ]
                }
            ]
        })
    }

    #[test]
    fn new_england_rollup_synthesizes_counties() {
        let res = normalize(&meta(), &ri_payload()).unwrap();
        let counties: Vec<&ReportingUnit> = res
            .reporting_units
            .iter()
            .filter(|u| u.level == Some(Level::County))
            .collect();
        // Two FIPS codes have qualifying townships; the other three
        // Rhode Island counties produce nothing.
        assert_eq!(counties.len(), 2);

        let kent = counties
            .iter()
            .find(|u| u.fipscode.as_deref() == Some("44003"))
            .unwrap();
        assert_eq!(kent.reportingunitname.as_deref(), Some("Kent"));
        assert_eq!(kent.reportingunitid.as_deref(), Some("county-RI-44003"));
        assert_eq!(kent.votecount, Some(600));

        let providence = counties
            .iter()
            .find(|u| u.fipscode.as_deref() == Some("44007"))
            .unwrap();
        assert_eq!(providence.reportingunitname.as_deref(), Some("Providence"));
        // Mail ballots are excluded from every county sum.
        assert_eq!(providence.votecount, Some(400 + 300 + 500 + 200));
        assert_eq!(providence.precinctstotal, 10);
        assert_eq!(providence.precinctsreporting, 10);
        assert!((providence.precinctsreportingpct - 1.0).abs() < 1e-12);
    }

    #[test]
    fn new_england_rollup_candidate_totals() {
        let res = normalize(&meta(), &ri_payload()).unwrap();
        let providence_crus: Vec<&CandidateReportingUnit> = res
            .candidate_reporting_units
            .iter()
            .filter(|c| c.reportingunitid.as_deref() == Some("county-RI-44007"))
            .collect();
        assert_eq!(providence_crus.len(), 2);
        let quinn = providence_crus
            .iter()
            .find(|c| c.unique_id == "polid-7001")
            .unwrap();
        assert_eq!(quinn.votecount, 900);
        assert!((quinn.votepct - 900.0 / 1400.0).abs() < 1e-12);
        assert_eq!(quinn.level, Some(Level::County));
        assert_eq!(quinn.id, "30111-polid-7001-county-RI-44007");
    }

    #[test]
    fn townships_keep_their_own_records() {
        let res = normalize(&meta(), &ri_payload()).unwrap();
        let townships: Vec<&ReportingUnit> = res
            .reporting_units
            .iter()
            .filter(|u| u.level == Some(Level::Township))
            .collect();
        // The mail-ballot bucket stays in the output as a township; it
        // is only excluded from rollup sums.
        assert_eq!(townships.len(), 4);
        // State backfill takes the last child's state.
        assert_eq!(res.races[0].statepostal.as_deref(), Some("RI"));
        assert_eq!(res.races[0].statename.as_deref(), Some("Rhode Island"));
    }

    #[test]
    fn composite_ids_are_unique() {
        let res = normalize(&meta(), &ri_payload()).unwrap();
        let ids: Vec<&String> = res
            .candidate_reporting_units
            .iter()
            .map(|c| &c.id)
            .collect();
        let unique: HashSet<&String> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());

        let cand_ids: HashSet<&String> = res.candidates.iter().map(|c| &c.id).collect();
        assert_eq!(cand_ids.len(), res.candidates.len());
    }

    #[test]
    fn winner_runoff_exclusivity() {
        let payload = json!({
            "races": [
                {
                    "raceID": "555",
                    "officeID": "G",
                    "reportingUnits": [
                        {
                            "statePostal": "LA",
                            "level": "state",
                            "candidates": [
                                {"last": "A", "candidateID": "1", "polID": "31", "polNum": "41", "voteCount": 40, "winner": "R"},
                                {"last": "B", "candidateID": "2", "polID": "32", "polNum": "42", "voteCount": 35, "winner": "R"},
                                {"last": "C", "candidateID": "3", "polID": "33", "polNum": "43", "voteCount": 25}
                            ]
                        }
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        for cru in &res.candidate_reporting_units {
            assert!(cru.winner || !cru.runoff, "runoff implies winner");
        }
        let advancing: Vec<&CandidateReportingUnit> = res
            .candidate_reporting_units
            .iter()
            .filter(|c| c.runoff)
            .collect();
        assert_eq!(advancing.len(), 2);
        assert!(advancing.iter().all(|c| c.winner));
    }

    #[test]
    fn uncontested_race_has_no_votecount() {
        let payload = json!({
            "races": [
                {
                    "raceID": "777",
                    "officeID": "H",
                    "uncontested": true,
                    "reportingUnits": [
                        {
                            "statePostal": "OH",
                            "level": "state",
                            "candidates": [
                                {"last": "Solo", "candidateID": "9", "polID": "99", "polNum": "909", "voteCount": 0}
                            ]
                        }
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        assert_eq!(res.reporting_units[0].votecount, None);
        assert_eq!(res.candidate_reporting_units[0].votepct, 0.0);
    }

    #[test]
    fn zero_votes_reported_is_not_an_error() {
        let payload = json!({
            "races": [
                {
                    "raceID": "778",
                    "officeID": "H",
                    "reportingUnits": [
                        {
                            "statePostal": "OH",
                            "level": "state",
                            "candidates": [
                                {"last": "A", "candidateID": "1", "polID": "41", "polNum": "51", "voteCount": 0},
                                {"last": "B", "candidateID": "2", "polID": "42", "polNum": "52", "voteCount": 0}
                            ]
                        }
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        assert_eq!(res.reporting_units[0].votecount, Some(0));
        for cru in &res.candidate_reporting_units {
            assert_eq!(cru.votepct, 0.0);
        }
    }

    #[test]
    fn candidate_without_identity_is_skipped() {
        let payload = json!({
            "races": [
                {
                    "raceID": "779",
                    "officeID": "H",
                    "reportingUnits": [
                        {
                            "statePostal": "OH",
                            "level": "state",
                            "candidates": [
                                {"last": "Ghost", "candidateID": "1", "voteCount": 10},
                                {"last": "Real", "candidateID": "2", "polID": "42", "polNum": "52", "voteCount": 30}
                            ]
                        }
                    ]
                }
            ]
        });
        let res = normalize(&meta(), &payload).unwrap();
        assert_eq!(res.candidate_reporting_units.len(), 1);
        assert_eq!(
            res.candidate_reporting_units[0].last.as_deref(),
            Some("Real")
        );
        // The sum covers the records that were kept.
        assert_eq!(res.reporting_units[0].votecount, Some(30));
    }

    #[test]
    fn missing_races_key_aborts() {
        assert_eq!(
            normalize(&meta(), &json!({"notraces": []})),
            Err(NormalizeError::MissingRacesKey)
        );
    }

    #[test]
    fn missing_raceid_aborts_with_index() {
        let payload = json!({
            "races": [
                {"raceID": "1", "officeID": "G", "reportingUnits": []},
                {"officeID": "G", "reportingUnits": []}
            ]
        });
        assert_eq!(
            normalize(&meta(), &payload),
            Err(NormalizeError::MissingRaceId { race_index: 1 })
        );
    }

    #[test]
    fn raceid_filter_selects_races() {
        let payload = json!({
            "races": [
                {"raceID": "1", "officeID": "G", "reportingUnits": []},
                {"raceID": "2", "officeID": "G", "reportingUnits": []}
            ]
        });
        let mut m = meta();
        m.raceids = vec!["2".to_string()];
        let res = normalize(&m, &payload).unwrap();
        assert_eq!(res.races.len(), 1);
        assert_eq!(res.races[0].raceid, "2");
    }

    #[test]
    fn normalization_is_idempotent() {
        let a = normalize(&meta(), &ri_payload()).unwrap();
        let b = normalize(&meta(), &ri_payload()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dedupe_keeps_first_seen_in_traversal_order() {
        let res = normalize(&meta(), &ri_payload()).unwrap();
        // Quinn appears first in the state unit; dedupe must preserve
        // that identity and order, not just the count.
        assert_eq!(res.candidates.len(), 2);
        assert_eq!(res.candidates[0].unique_id, "polid-7001");
        assert_eq!(res.candidates[0].last.as_deref(), Some("Quinn"));
        assert_eq!(res.candidates[1].unique_id, "polid-7002");
    }
}
