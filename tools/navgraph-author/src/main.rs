use std::io;
use std::path::PathBuf;

use anyhow::Result;
use navgraph_author::{viewer, Config, Session};
use navgraph_core::LineOperator;
use structopt::StructOpt;
use tracing::Level;

#[derive(StructOpt, Debug)]
#[structopt(name = "navgraph-author")]
struct Opt {
    /// YAML config file (defaults to ./navgraph.yaml when present)
    #[structopt(parse(from_os_str), short = "c", long = "config")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    #[structopt(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(StructOpt, Debug)]
enum Cmd {
    /// Interactive graph authoring (default)
    Author,
    /// Floor plan viewer; speaks the pick-point protocol on stdin/stdout
    View {
        #[structopt(long = "building")]
        building: String,
        #[structopt(long = "floor", allow_hyphen_values = true)]
        floor: i32,
        /// Read the record store instead of a snapshot from an authoring session
        #[structopt(long = "standalone")]
        standalone: bool,
    },
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    let config = Config::load(opt.config.as_deref())?;

    match opt.cmd.unwrap_or(Cmd::Author) {
        Cmd::Author => {
            let operator = LineOperator::new(io::stdin().lock(), io::stdout());
            let mut session = Session::open(config, operator)?;
            session.run(&Session::registry())
        }
        Cmd::View {
            building,
            floor,
            standalone,
        } => viewer::run_viewer(&config, &building, floor, standalone),
    }
}
