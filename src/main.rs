//! pgscratch - An interactive scratchpad SQL session for PostgreSQL.

mod cli;
mod logging;

use cli::Cli;
use pgscratch::config::Config;
use pgscratch::display::{ConsoleSink, Display, FileSink};
use pgscratch::input::{FileRegisters, InputSource};
use pgscratch::session::Session;
use pgscratch::{repl, Result};
use tokio::io::BufReader;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.is_interactive() {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let mut settings = config.session.clone();
    cli.apply_overrides(&mut settings);

    let target = config.resolve_target(cli.connection_string(), cli.connection_name())?;

    let mut display = match &cli.output {
        Some(path) => Display::with_sink(Box::new(FileSink::open(path)?)),
        None => Display::with_sink(Box::new(ConsoleSink)),
    };

    let mut session = Session::new(&settings);
    session.init(target, false, &mut display).await?;

    let outcome = if let Some(text) = &cli.execute {
        session.submit(text, &mut display).await
    } else if let Some(name) = &cli.register {
        let registers = FileRegisters::new(cli.registers_dir());
        match registers.read(name) {
            Ok(text) => session.submit(&text, &mut display).await,
            Err(e) => Err(e),
        }
    } else {
        let stdin = BufReader::new(tokio::io::stdin());
        repl::run(&mut session, &mut display, stdin, true).await
    };

    session.close().await?;
    outcome
}
