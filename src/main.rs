// src/main.rs

mod app_logic;
mod core;
mod platform_layer;

use crate::app_logic::ui_constants::APP_NAME;
use crate::app_logic::{AppServices, PeonyAppLogic};
use crate::core::conversion::ExitNotifier;
use crate::core::{
    ConversionGate, CoreConfigManager, CoreFavoritesStore, CoreProcessLauncher,
    CoreSessionStateStore, CoreTrash, CoreUserDirs, ProcMountsVolumeMonitor, ProcessExit,
    ProcessLauncherOperations, UserDirsOperations, VolumeMonitorOperations, mount_watcher,
    path_utils, uri_utils,
};
use crate::platform_layer::{
    AppEvent, ConsoleCommandExecutor, PlatformEventHandler, PlatformInterface, console,
};

use directories::BaseDirs;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

static LOGGING_INIT: Once = Once::new();

/*
 * Sets up logging to the terminal and, when the cache directory is usable,
 * to `peony.log` inside it. Safe to call more than once; only the first call
 * has an effect. Tests call it to see the application's log output.
 */
pub fn initialize_logging() {
    initialize_logging_with_level(LevelFilter::Debug);
}

fn initialize_logging_with_level(level: LevelFilter) {
    LOGGING_INIT.call_once(|| {
        let config = ConfigBuilder::new()
            .set_time_offset(time::UtcOffset::UTC)
            .build();
        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )];
        if !cfg!(test) {
            if let Some(log_path) = path_utils::get_base_app_cache_dir(APP_NAME)
                .filter(|dir| path_utils::ensure_private_dir(dir).is_ok())
                .map(|dir| dir.join("peony.log"))
            {
                match File::create(&log_path) {
                    Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
                    Err(e) => eprintln!("Failed to create log file {log_path:?}: {e}"),
                }
            }
        }
        if let Err(e) = CombinedLogger::init(loggers) {
            eprintln!("Failed to initialize logger: {e}");
        }
    });
}

/* Command line options; anything that is not a flag is a location to open. */
#[derive(Debug, Default)]
struct CommandLine {
    resumed: bool,
    no_desktop: bool,
    quit: bool,
    verbose: bool,
    locations: Vec<String>,
}

impl CommandLine {
    fn parse(args: impl Iterator<Item = String>, base: &Path) -> Self {
        let mut options = CommandLine::default();
        for arg in args {
            match arg.as_str() {
                "--resumed" => options.resumed = true,
                "--no-desktop" => options.no_desktop = true,
                "-q" | "--quit" => options.quit = true,
                "-v" | "--verbose" => options.verbose = true,
                _ => options.locations.push(uri_utils::location_to_uri(&arg, base)),
            }
        }
        options
    }
}

fn main() {
    let user_dirs = Arc::new(CoreUserDirs::new());
    let working_dir = std::env::current_dir().unwrap_or_else(|_| user_dirs.home_dir());
    let options = CommandLine::parse(std::env::args().skip(1), &working_dir);
    if options.verbose {
        initialize_logging();
    } else {
        initialize_logging_with_level(LevelFilter::Info);
    }
    log::info!("Application Starting");

    let platform_interface = match PlatformInterface::new(APP_NAME.to_string()) {
        Ok(pi) => pi,
        Err(e) => {
            log::error!("Failed to initialize the event loop: {e:?}");
            return;
        }
    };
    let events = platform_interface.event_sender();

    let launcher: Arc<dyn ProcessLauncherOperations> = Arc::new(CoreProcessLauncher::new());
    let volume_monitor: Arc<dyn VolumeMonitorOperations> = Arc::new(
        ProcMountsVolumeMonitor::new(user_dirs.home_dir(), Arc::clone(&launcher)),
    );
    let trash = CoreTrash::for_user().unwrap_or_else(|| {
        CoreTrash::new(user_dirs.home_dir().join(".local/share/Trash"))
    });
    let favorites = match CoreFavoritesStore::for_app(APP_NAME) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to locate the favorites file: {e}");
            return;
        }
    };
    let session_store = match CoreSessionStateStore::for_app(APP_NAME) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to locate the session state file: {e}");
            return;
        }
    };
    let exit_events = events.clone();
    let notify_exit: ExitNotifier = Arc::new(move |exit: ProcessExit| {
        exit_events.send(AppEvent::ConversionProcessExited { pid: exit.pid });
    });
    let conversion_gate = match ConversionGate::for_app(APP_NAME, launcher, notify_exit) {
        Ok(gate) => gate,
        Err(e) => {
            log::error!("Failed to set up the conversion cache: {e}");
            return;
        }
    };

    let mut app_logic = PeonyAppLogic::new(AppServices {
        volume_monitor: Arc::clone(&volume_monitor),
        favorites: Arc::new(favorites),
        user_dirs,
        config_manager: Arc::new(CoreConfigManager::new()),
        session_store: Arc::new(session_store),
        trash: Arc::new(trash),
        conversion_gate,
        events: events.clone(),
        required_directory: path_utils::get_base_app_config_local_dir(APP_NAME),
        bookmarks_file: BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("gtk-3.0").join("bookmarks")),
    });
    if options.no_desktop {
        app_logic.disable_desktop();
    }
    let app_logic: Arc<Mutex<dyn PlatformEventHandler>> = Arc::new(Mutex::new(app_logic));

    let volume_events = events.clone();
    if let Err(e) = mount_watcher::spawn_mount_poller(
        volume_monitor,
        mount_watcher::DEFAULT_POLL_INTERVAL,
        move |event| volume_events.send(AppEvent::Volume(event)),
    ) {
        log::warn!("Failed to start the mount poller, devices will not update: {e}");
    }
    if let Err(e) = console::spawn_console_reader(events.clone()) {
        log::warn!("Failed to start the console reader: {e}");
    }

    events.send(AppEvent::Startup {
        resumed: options.resumed,
        locations: options.locations,
    });
    if options.quit {
        events.send(AppEvent::QuitRequested);
    }

    let mut executor = ConsoleCommandExecutor::new();
    if let Err(e) = platform_interface.run(app_logic, &mut executor) {
        log::error!("Application run loop exited with error: {e:?}");
    }
    log::info!("Application Exiting");
}
