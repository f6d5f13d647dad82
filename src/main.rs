//! Command-line front end: assemble a source file and either print the
//! encoded words or run them on the simulator.

#[macro_use]
extern crate log;

use std::fs;
use std::path::PathBuf;
use std::process;

use log::LevelFilter;
use structopt::StructOpt;

use mipsim::asm::assemble;
use mipsim::err;
use mipsim::sim::io::InputSource;
use mipsim::sim::Simulator;

#[derive(StructOpt)]
#[structopt(name = "mipsim", about = "Assemble and run MIPS32 programs")]
struct CliArgs {
    /// Only assemble the program, printing the encoded words to stdout
    #[structopt(long)]
    assemble_only: bool,

    /// Feed input system calls from this file instead of stdin
    #[structopt(long, parse(from_os_str))]
    input: Option<PathBuf>,

    /// Log every instruction as it executes
    #[structopt(short, long)]
    verbose: bool,

    /// The assembly source file
    #[structopt(parse(from_os_str))]
    file_path: PathBuf,
}

fn main() {
    let args = CliArgs::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.init();

    let src = match fs::read_to_string(&args.file_path) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("error: could not read {}: {e}", args.file_path.display());
            process::exit(1);
        }
    };

    let obj = match assemble(&src) {
        Ok(obj) => obj,
        Err(e) => {
            eprintln!("{}", err::report(&e));
            process::exit(1);
        }
    };

    if args.assemble_only {
        for word in obj.words() {
            println!("{word:032b}");
        }
        return;
    }

    let mut sim = Simulator::new();
    sim.load_program(&obj);

    if let Some(path) = &args.input {
        match fs::read_to_string(path) {
            Ok(text) => sim.set_input(InputSource::script(&text)),
            Err(e) => {
                eprintln!("error: could not read {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    match sim.run() {
        Ok(exit) => {
            debug!("ran {} instruction(s)", sim.instructions_run);
            process::exit(exit.code());
        }
        Err(e) => {
            eprintln!("{}", err::report(&e));
            process::exit(1);
        }
    }
}
