use log::{info, warn};

use election_results::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};

#[derive(Debug, Snafu)]
pub enum ElexError {
    #[snafu(display("Error opening data file {path}"))]
    OpeningDataFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing CSV output"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error normalizing results: {source}"))]
    Normalizing { source: NormalizeError },
    #[snafu(display("No data file given; pass --data-file"))]
    MissingDataFile {},
    #[snafu(display("No election date given; pass --election-date or put electionDate in the data file"))]
    MissingElectionDate {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ElexResult<T> = Result<T, ElexError>;

fn read_payload(path: &str) -> ElexResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningDataFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// The election date stamped onto every record. A top-level
/// `electionDate` key in the payload wins over the command line flag.
fn resolve_election_date(args: &Args, payload: &JSValue) -> ElexResult<String> {
    if let Some(JSValue::String(d)) = payload.get("electionDate") {
        return Ok(d.clone());
    }
    args.election_date.clone().context(MissingElectionDateSnafu {})
}

fn records_to_json<R: Record>(records: &[R]) -> JSValue {
    JSValue::Array(records.iter().map(|r| r.to_json()).collect())
}

fn csv_field(v: &JSValue) -> String {
    match v {
        JSValue::Null => String::new(),
        JSValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn records_to_csv<R: Record>(records: &[R]) -> ElexResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(R::COLUMNS).context(WritingCsvSnafu {})?;
    for r in records {
        let row: Vec<String> = r.values().iter().map(csv_field).collect();
        writer.write_record(&row).context(WritingCsvSnafu {})?;
    }
    let bytes = match writer.into_inner() {
        Ok(b) => b,
        Err(e) => whatever!("Failed to flush CSV output: {:?}", e),
    };
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => whatever!("CSV output is not UTF-8: {:?}", e),
    }
}

fn render_json(results: &NormalizedResults, command: &Command) -> JSValue {
    match command {
        Command::Races => records_to_json(&results.races),
        Command::ReportingUnits => records_to_json(&results.reporting_units),
        Command::CandidateReportingUnits => {
            records_to_json(&results.candidate_reporting_units)
        }
        Command::Candidates => records_to_json(&results.candidates),
        Command::BallotMeasures => records_to_json(&results.ballot_measures),
        Command::Results => {
            let mut obj = serde_json::Map::new();
            obj.insert("election".to_string(), results.election.to_json());
            obj.insert("races".to_string(), records_to_json(&results.races));
            obj.insert(
                "reporting_units".to_string(),
                records_to_json(&results.reporting_units),
            );
            obj.insert(
                "candidate_reporting_units".to_string(),
                records_to_json(&results.candidate_reporting_units),
            );
            obj.insert(
                "candidates".to_string(),
                records_to_json(&results.candidates),
            );
            obj.insert(
                "ballot_measures".to_string(),
                records_to_json(&results.ballot_measures),
            );
            JSValue::Object(obj)
        }
    }
}

fn render_csv(results: &NormalizedResults, command: &Command) -> ElexResult<String> {
    match command {
        Command::Races => records_to_csv(&results.races),
        Command::ReportingUnits => records_to_csv(&results.reporting_units),
        Command::CandidateReportingUnits => records_to_csv(&results.candidate_reporting_units),
        Command::Candidates => records_to_csv(&results.candidates),
        Command::BallotMeasures => records_to_csv(&results.ballot_measures),
        // One section per record kind, each with its own header row.
        Command::Results => {
            let sections = vec![
                records_to_csv(std::slice::from_ref(&results.election))?,
                records_to_csv(&results.races)?,
                records_to_csv(&results.reporting_units)?,
                records_to_csv(&results.candidate_reporting_units)?,
                records_to_csv(&results.candidates)?,
                records_to_csv(&results.ballot_measures)?,
            ];
            Ok(sections.join("\n"))
        }
    }
}

pub fn run(args: &Args) -> ElexResult<()> {
    let data_path = args.data_file.clone().context(MissingDataFileSnafu {})?;
    let payload = read_payload(&data_path)?;
    let electiondate = resolve_election_date(args, &payload)?;

    let meta = ElectionMeta {
        electiondate,
        liveresults: !args.test,
        testresults: args.test,
        raceids: args.raceids.clone().unwrap_or_default(),
    };
    info!("processing {} for election {}", data_path, meta.electiondate);

    let results = normalize(&meta, &payload).context(NormalizingSnafu {})?;

    let rendered = match args.output.as_str() {
        "json" => {
            let js = render_json(&results, &args.command);
            serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?
        }
        "csv" => render_csv(&results, &args.command)?,
        x => whatever!("Unknown output format {:?}; expected csv or json", x),
    };
    println!("{}", rendered);

    // The reference output, if provided for comparison.
    if let Some(reference_path) = args.reference.clone() {
        let reference_js = read_payload(&reference_path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        let js = render_json(&results, &args.command);
        let pretty_produced = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
        if pretty_reference != pretty_produced {
            warn!("Found differences with the reference output");
            print_diff(pretty_reference.as_str(), pretty_produced.as_str(), "\n");
            whatever!("Difference detected between produced records and reference output")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_results() -> NormalizedResults {
        let meta = ElectionMeta {
            electiondate: "2015-11-03".to_string(),
            liveresults: true,
            testresults: false,
            raceids: Vec::new(),
        };
        let payload = json!({
            "races": [
                {
                    "raceID": "18525",
                    "raceType": "General",
                    "officeID": "G",
                    "officeName": "Governor",
                    "reportingUnits": [
                        {
                            "statePostal": "KY",
                            "level": "state",
                            "precinctsReporting": 10,
                            "precinctsTotal": 10,
                            "precinctsReportingPct": 100.0,
                            "candidates": [
                                {"first": "Matt", "last": "Bevin", "party": "GOP", "candidateID": "5295", "polID": "63424", "polNum": "20103", "ballotOrder": 2, "voteCount": 511771, "winner": "X"},
                                {"first": "Jack", "last": "Conway", "party": "Dem", "candidateID": "5266", "polID": "204", "polNum": "19601", "ballotOrder": 1, "voteCount": 426944}
                            ]
                        }
                    ]
                }
            ]
        });
        normalize(&meta, &payload).unwrap()
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let results = sample_results();
        let out = records_to_csv(&results.candidate_reporting_units).unwrap();
        let lines: Vec<&str> = out.trim_end().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,raceid,racetype"));
        assert!(lines[1].contains("Bevin"));
        assert!(lines[2].contains("Conway"));
    }

    #[test]
    fn null_fields_render_as_empty_csv_cells() {
        assert_eq!(csv_field(&JSValue::Null), "");
        assert_eq!(csv_field(&json!("KY")), "KY");
        assert_eq!(csv_field(&json!(42)), "42");
        assert_eq!(csv_field(&json!(true)), "true");
    }

    #[test]
    fn results_json_has_all_sections() {
        let results = sample_results();
        let js = render_json(&results, &Command::Results);
        let obj = js.as_object().unwrap();
        for key in [
            "election",
            "races",
            "reporting_units",
            "candidate_reporting_units",
            "candidates",
            "ballot_measures",
        ] {
            assert!(obj.contains_key(key), "missing section {}", key);
        }
        assert_eq!(obj["races"].as_array().unwrap().len(), 1);
        assert_eq!(obj["candidates"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn json_rows_follow_column_order() {
        let results = sample_results();
        let js = render_json(&results, &Command::Races);
        let row = &js.as_array().unwrap()[0];
        let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, Race::COLUMNS);
    }
}
