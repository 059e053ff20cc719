//! main.rs
//! Entry point for sift

pub(crate) mod app;
pub(crate) mod config;
pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod ui;
pub(crate) mod utils;

use crate::app::Session;
use crate::config::Config;
use crate::core::signals::{SIGNALS, install_handlers};
use crate::core::terminal::{self, TermMode};
use crate::error::BrowserError;
use crate::utils::cli::{CliAction, CliOptions, handle_args};
use crate::utils::{expand_home_path, logging};

use std::io::Write;

fn main() {
    std::panic::set_hook(Box::new(|info| {
        SIGNALS.restore_terminal();
        eprintln!("\n[sift] Error occurred: {}", info);

        #[cfg(debug_assertions)]
        {
            let bt = std::backtrace::Backtrace::force_capture();
            eprintln!("\nStack Backtrace:\n{}", bt);
        }
    }));

    let options = match handle_args() {
        CliAction::Run(options) => options,
        CliAction::Exit => return,
        CliAction::Fail => std::process::exit(2),
    };

    logging::init();
    let config = Config::load();

    match run(&config, &options) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&output).and_then(|_| stdout.flush()) {
                eprintln!("[sift] Error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("[sift] Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Runs the browser and returns what should be printed once the terminal is restored.
fn run(config: &Config, options: &CliOptions) -> Result<Vec<u8>, BrowserError> {
    let start = match &options.path {
        Some(path) => expand_home_path(&path.to_string_lossy()),
        None => std::env::current_dir()?,
    };

    install_handlers();
    let term = TermMode::open()?;
    let mut session = Session::new(config, &start, Some(term))?;
    for command in &options.commands {
        session.execute(command)?;
        if session.should_quit() {
            break;
        }
    }

    let result = if session.should_quit() {
        Ok(())
    } else {
        terminal::run_terminal(&mut session)
    };
    session.shutdown();
    let output = options.output.render(session.state());
    // Dropping the session restores the terminal before anything is printed.
    drop(session);

    result.map(|_| output)
}
