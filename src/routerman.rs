use anyhow::{Context as _, Result};
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::info;

use routerman::config::{Cli, Command};
use routerman::router::SnapshotRouter;
use routerman::storage::JsonStore;
use routerman::{Error, LineConsole, Manager, Session};

fn open_store(cli: &Cli) -> Result<JsonStore> {
    JsonStore::open(&cli.db).with_context(|| {
        format!(
            "opening {} (run `routerman db --init` first)",
            cli.db.display()
        )
    })
}

fn open_router(cli: &Cli) -> Result<SnapshotRouter> {
    SnapshotRouter::open(&cli.router_state)
        .with_context(|| format!("opening {}", cli.router_state.display()))
}

fn run(cli: &Cli) -> Result<()> {
    info!(
        db = %cli.db.display(),
        router_state = %cli.router_state.display(),
        username = cli.username.as_deref().unwrap_or(""),
        address = cli.address.as_deref().unwrap_or(""),
        "starting"
    );

    match &cli.command {
        Command::Db { init } => {
            if *init {
                JsonStore::init(&cli.db)
                    .with_context(|| format!("initialising {}", cli.db.display()))?;
            } else {
                open_store(cli)?;
            }
            println!("database ready: {}", cli.db.display());
        }
        Command::Slots => {
            let manager = Manager::new(open_router(cli)?, JsonStore::in_memory());
            for slot in manager.available_slots(cli.bound_policy())? {
                println!("{slot}");
            }
        }
        Command::Cli => {
            let manager = Manager::new(open_router(cli)?, open_store(cli)?);
            let mut session = Session::new(manager, cli.session_settings());
            let stdin = io::stdin();
            let mut console = LineConsole::new(stdin.lock(), io::stdout());
            match session.run(&mut console) {
                // Ctrl-D at a prompt ends the session like `Q`.
                Err(Error::InputClosed) => println!(),
                other => other?,
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    routerman::logging::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
