use clap::{Parser, Subcommand};

/// Command line tool turning raw AP election result feeds into flat
/// records, one subcommand per record kind.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (file path) The raw results file for one election date, as
    /// downloaded from the AP elections API (JSON).
    #[clap(short, long, value_parser, global = true)]
    pub data_file: Option<String>,

    /// (YYYY-MM-DD) The election date. A top-level electionDate key in
    /// the data file takes precedence over this flag.
    #[clap(short, long, value_parser, global = true)]
    pub election_date: Option<String>,

    /// Mark the output records as test data rather than live results.
    #[clap(short, long, takes_value = false, global = true)]
    pub test: bool,

    /// (list of comma-separated race ids) If specified, only these
    /// races are processed.
    #[clap(long, value_parser, use_value_delimiter = true, global = true)]
    pub raceids: Option<Vec<String>>,

    /// (default csv) The output format, csv or json.
    #[clap(short, long, value_parser, default_value = "csv", global = true)]
    pub output: String,

    /// (file path) A reference file containing previously produced
    /// JSON output. If provided, the tool checks that the produced
    /// records match the reference and prints a diff otherwise.
    #[clap(short, long, value_parser, global = true)]
    pub reference: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the
    /// standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// Output one record per race.
    Races,
    /// Output one record per reporting unit, including the
    /// synthesized New England county rollups.
    ReportingUnits,
    /// Output one record per candidate per reporting unit.
    CandidateReportingUnits,
    /// Output one record per unique candidate.
    Candidates,
    /// Output one record per unique ballot measure.
    BallotMeasures,
    /// Output every record kind in sequence, section by section.
    Results,
}
