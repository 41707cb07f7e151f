use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://s1.ripple.com:51234/";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("flowtrace")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("flowtrace")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log more (repeat for debug and trace)")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl outgoing fund flows breadth-first from one or more seed accounts and \
                print a summary of the graph.",
                )
                .arg(
                    arg!([SEEDS] ...)
                        .required(false)
                        .help("Seed account addresses")
                        .conflicts_with("seeds-file"),
                )
                .arg(
                    arg!(-S --"seeds-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed addresses ('#' starts a comment)")
                        .conflicts_with("SEEDS"),
                )
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("JSON-RPC endpoint of a rippled server")
                        .value_parser(clap::value_parser!(Url))
                        .default_value(DEFAULT_ENDPOINT),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Accounts at this depth are recorded but not expanded")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"max-accounts" <NUM>)
                        .required(false)
                        .help("Stop the crawl once this many accounts are in the graph")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("200"),
                )
                .arg(
                    arg!(--"max-edges" <NUM>)
                        .required(false)
                        .help("Stop the crawl once this many edges are in the graph")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1000"),
                )
                .arg(
                    arg!(--"per-node" <NUM>)
                        .required(false)
                        .help("Outgoing transactions kept per expanded account")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                )
                .arg(
                    arg!(--"page-size" <NUM>)
                        .required(false)
                        .help("Transactions requested per page")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("50"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Pages read per account")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"max-pages-total" <NUM>)
                        .required(false)
                        .help("Pages read across the whole crawl")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("500"),
                )
                .arg(
                    arg!(--"max-tx" <NUM>)
                        .required(false)
                        .help("Transactions scanned across the whole crawl")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("25000"),
                )
                .arg(
                    arg!(--"ledger-min" <LEDGER>)
                        .required(false)
                        .help("Ignore transactions before this ledger")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"ledger-max" <LEDGER>)
                        .required(false)
                        .help("Ignore transactions after this ledger")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"start-date" <DATE>)
                        .required(false)
                        .help("Ignore transactions before this date (YYYY-MM-DD)"),
                )
                .arg(
                    arg!(--"end-date" <DATE>)
                        .required(false)
                        .help("Ignore transactions after this date (YYYY-MM-DD)"),
                )
                .arg(
                    arg!(--"min-xrp" <XRP>)
                        .required(false)
                        .help("Ignore XRP transfers below this amount")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"no-metadata")
                        .required(false)
                        .help("Skip account info and activation lookups")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"seed-tokens")
                        .required(false)
                        .help("Summarise trust lines and issued tokens of the seed accounts")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Requests in flight at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                )
                .arg(
                    arg!(-r --"retries" <NUM>)
                        .required(false)
                        .help("Retries per request on transient failures")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("20"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the graph to file (default: summary on screen only)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Graph file format: json snapshot or graphviz dot")
                        .value_parser(["json", "dot"])
                        .default_value("json"),
                )
                .arg(
                    arg!(--"analyze")
                        .required(false)
                        .help("Run pattern detection on the graph once the crawl ends")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"report" <PATH>)
                        .required(false)
                        .help("Save the text report to file"),
                ),
        )
        .subcommand(
            command!("path")
                .about("Find the shortest directed flow path between two accounts in a saved snapshot")
                .arg(
                    arg!(-s --"snapshot" <PATH>)
                        .required(true)
                        .help("Snapshot written by 'crawl --format json'"),
                )
                .arg(arg!(--"from" <ADDRESS>).required(true).help("Source account"))
                .arg(arg!(--"to" <ADDRESS>).required(true).help("Destination account")),
        )
        .subcommand(
            command!("analyze")
                .about("Run pattern detection over a saved snapshot")
                .arg(
                    arg!(-s --"snapshot" <PATH>)
                        .required(true)
                        .help("Snapshot written by 'crawl --format json'"),
                )
                .arg(
                    arg!(--"fan-threshold" <NUM>)
                        .required(false)
                        .help("Distinct counterparties that make an account fan-out or fan-in")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"burst-window" <LEDGERS>)
                        .required(false)
                        .help("Burst window width in ledgers")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"burst-threshold" <NUM>)
                        .required(false)
                        .help("Transactions inside one window that count as a burst")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"max-cycle-len" <NUM>)
                        .required(false)
                        .help("Longest cycle searched for, in edges")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("6"),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print findings as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the report to file (default: display to screen)"),
                ),
        )
}
