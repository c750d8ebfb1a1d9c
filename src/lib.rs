use std::env;
use std::path::PathBuf;
use clap::Parser;
use log::info;
use tokio::runtime::Builder;

use crate::config::io::ConfigIO;
use crate::config::types::ConfigOverrides;
use crate::device::payload::PayloadEncoding;
use crate::error::AppRunError;
use crate::gui::application::run_application;
use crate::headless::run_headless;

pub mod config;
pub mod dashboard;
pub mod device;
pub mod error;
pub mod gui;
pub mod headless;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Shows the step count of a Step-Sense bluetooth peripheral", long_about = None)]
pub struct Args {
    /// Path to the config file, instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Advertised name of the peripheral to connect to
    #[arg(long)]
    pub device_name: Option<String>,

    /// Number of steps that fills the progress ring
    #[arg(long)]
    pub goal: Option<u32>,

    /// How the peripheral encodes the step count
    #[arg(long, value_enum)]
    pub encoding: Option<PayloadEncoding>,

    /// Log the step count instead of opening a window
    #[arg(long)]
    pub headless: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device_name: self.device_name.clone(),
            step_goal: self.goal,
            payload_encoding: self.encoding,
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info }
    }
}

pub fn init_logging(level: log::LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync(args.config.as_deref())?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let (config, error_message) = Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(config_io.load());
    let config = config.with_overrides(&args.overrides());
    info!("Looking for peripheral {:?}", config.device_name);

    if args.headless {
        return run_headless(config);
    }

    run_application(config, error_message.into_iter().collect())
}
