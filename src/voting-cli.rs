//! A simple CLI tool for auditing voting system event logs and minting caller tokens.
//! Auditing uses the server's own replay implementation, so it accepts exactly
//! the event logs the server writes.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};

use voting_system::{
    contract::{read_records, ReplayError, VotingSystem},
    model::{auth::AuthToken, Address, Identity, TallyDescription},
    Config,
};

const PROGRAM_NAME: &str = "voting-cli";

const ABOUT_TEXT: &str = "Audit a voting system event log, or mint a caller token.

EXIT CODES:
     0: Success.
   255: Ran successfully, but the event log failed verification.
 Other: Error.";

const REPLAY: &str = "replay";
const EVENT_LOG: &str = "EVENT_LOG";
const EVENT_LOG_HELP: &str = "The path to an event log, as written by the server's `event_log` \
setting or returned by `GET /events`, one record per line";

const TOKEN: &str = "token";
const ADDRESS: &str = "ADDRESS";
const ADDRESS_HELP: &str = "The 0x-prefixed address the token acts as";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(
            Command::new(REPLAY)
                .about("Replay an event log, verifying every record, and print the final state")
                .arg(
                    Arg::new(EVENT_LOG)
                        .help(EVENT_LOG_HELP)
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(TOKEN)
                .about("Sign a bearer token using the server configuration in `Rocket.toml`")
                .arg(
                    Arg::new(ADDRESS)
                        .help(ADDRESS_HELP)
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to parse some input.
    Format(String),
    /// The event log was readable, but does not verify.
    Verification(ReplayError),
}

impl From<ReplayError> for Error {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Io(e) => Self::IO(e.to_string()),
            ReplayError::Format { .. } => Self::Format(err.to_string()),
            other => Self::Verification(other),
        }
    }
}

/// What a verified event log amounts to.
#[derive(Debug)]
struct Audit {
    records: usize,
    users: Vec<Identity>,
    tallies: Vec<TallyDescription>,
}

impl Display for Audit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} records verified.", self.records)?;
        writeln!(f, "Users:")?;
        for user in &self.users {
            writeln!(f, "  {} {} ({})", user.address, user.name, user.role)?;
        }
        writeln!(f, "Elections:")?;
        for tally in &self.tallies {
            writeln!(f, "  Election {} ({}):", tally.election_id, tally.state)?;
            for (option, name) in tally.options.iter().enumerate() {
                let votes = tally.counts.get(&option).copied().unwrap_or_default();
                writeln!(
                    f,
                    "    {name}: {votes} vote{}",
                    if votes != 1 { "s" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}

/// Replay an event log.
fn audit(path: &str) -> Result<Audit, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let records = read_records(file)?;
    let count = records.len();
    let system = VotingSystem::replay(records)?;

    let tallies = system
        .elections()
        .iter()
        .map(|election| system.tally(election.id))
        .collect::<Result<Vec<_>, _>>()
        // Every listed election exists.
        .map_err(|e| Error::Format(e.to_string()))?;

    Ok(Audit {
        records: count,
        users: system.users(),
        tallies,
    })
}

/// Sign a token for `address` with the configured secret.
fn token(address: &str) -> Result<String, Error> {
    let address: Address = address
        .parse()
        .map_err(|e: voting_system::model::AddressError| Error::Format(e.to_string()))?;
    let config: Config = rocket::Config::figment()
        .extract()
        .map_err(|e| Error::Format(e.to_string()))?;
    Ok(AuthToken::new(address).encode(&config))
}

/// Run the chosen subcommand, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((REPLAY, sub_args)) => {
            let path: &String = sub_args.get_one(EVENT_LOG).unwrap(); // Required argument is guaranteed to be present.
            audit(path).map(|audit| format!("Verification succeeded.\n{audit}"))
        }
        Some((TOKEN, sub_args)) => {
            let address: &String = sub_args.get_one(ADDRESS).unwrap(); // Required argument is guaranteed to be present.
            token(address)
        }
        // `subcommand_required` guarantees one of the above.
        _ => unreachable!(),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid input: {msg}");
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {err}");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
