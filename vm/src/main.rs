use std::cell::RefCell;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::process;
use std::rc::Rc;

use tracing::info;
use vm::{Engine, Outcome};

// Logging stays off unless RUST_LOG asks for it, e.g. `RUST_LOG=vm=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn read_source(file: Option<&str>) -> io::Result<String> {
    match file {
        Some(file) => fs::read_to_string(file),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

// Runs to completion, resuming after every yield.
fn run(engine: &mut Engine, src: &str, file: &str) -> vm::VmResult<()> {
    let program = engine.compile_named(src, file)?;
    let mut outcome = engine.run(&program)?;

    loop {
        match outcome {
            Outcome::Complete(value) => {
                println!("=> {}", value);
                return Ok(());
            }
            Outcome::Suspended(suspension) => {
                info!(depth = suspension.depth(), "yielded, resuming");
                outcome = engine.resume(suspension)?;
            }
        }
    }
}

fn main() {
    init_tracing();

    let matches = clap::App::new("crash")
        .version("0.1")
        .about("Runs crash scripts")
        .arg(
            clap::Arg::with_name("FILE")
                .help("Script to run. Read stdin if not given.")
                .required(false),
        )
        .arg(
            clap::Arg::with_name("ListEnv")
                .long("inspect-env")
                .help("List names in the default environment and exit."),
        )
        .get_matches();

    let stdout: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(io::stdout()));
    let mut engine = Engine::new(stdout);

    if matches.is_present("ListEnv") {
        for name in engine.builtin_names() {
            println!("{}", name);
        }
        return;
    }

    let file = matches.value_of("FILE");
    let src = match read_source(file) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("{}: {}", file.unwrap_or("<stdin>"), err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&mut engine, &src, file.unwrap_or("<stdin>")) {
        eprintln!("{}", err);
        process::exit(1);
    }
}
