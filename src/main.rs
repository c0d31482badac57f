use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use the_hunt::app::App;
use the_hunt::cli::{self, Command, parse_cli};
use the_hunt::config::{self, HuntConfig, Settings};
use the_hunt::location::LocationProvider;
use the_hunt::store::{FileStore, KeyValueStore, MemoryStore};
use the_hunt::tui::TuiInterface;
use the_hunt::{info_log, logging, progress};

fn main() -> ExitCode {
    let cli = parse_cli();
    let command = cli.command.clone().unwrap_or(Command::Play);
    let data_dir: Option<PathBuf> = cli.data_dir.clone().or_else(config::data_dir);

    // The TUI owns the terminal, so only it logs to a file
    let log_dir = (command == Command::Play).then_some(data_dir.as_deref()).flatten();
    if let Err(e) = logging::init_logging(cli.verbose, log_dir) {
        eprintln!("Failed to set up logging: {e}");
    }

    let settings = HuntConfig::load(cli.config.as_deref())
        .map(Settings::from)
        .unwrap_or_default();
    let provider = cli.location_provider(&settings);

    let file_store;
    let memory_store;
    let store: &dyn KeyValueStore = match &data_dir {
        Some(dir) => {
            file_store = FileStore::new(dir);
            &file_store
        }
        None => {
            log::warn!("No data directory available; progress will not be saved");
            memory_store = MemoryStore::new();
            &memory_store
        }
    };
    info_log!("Starting {:?} with data dir {:?}", command, data_dir);

    match run(command, settings, store, provider) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    command: Command,
    settings: Settings,
    store: &dyn KeyValueStore,
    provider: Option<Arc<dyn LocationProvider>>,
) -> io::Result<()> {
    let mut stdout = io::stdout();
    match command {
        Command::Play => {
            let mut app = App::new(settings, store, provider);
            let mut tui = TuiInterface::new()?;
            tui.run(&mut app)
        }
        Command::Solve { puzzle } => {
            cli::run_solve(puzzle, &settings, store, io::stdin().lock(), &mut stdout)
        }
        Command::Status => {
            let snapshot = progress::aggregate(&progress::load_inputs(store, &settings));
            cli::display_status(&snapshot, &mut stdout)
        }
        Command::CheckLocation => {
            cli::run_check_location(&settings, provider.as_deref(), store, &mut stdout)
        }
        Command::Reset { target } => cli::run_reset(target, store, &mut stdout),
    }
}
