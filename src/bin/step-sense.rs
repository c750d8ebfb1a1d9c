use clap::Parser;
use log::info;
use msgbox::IconType;
use step_sense::{init_logging, run, Args};
use step_sense::error::{error_msgbox, AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.log_level());
    info!(concat!("Step Sense ", env!("CARGO_PKG_VERSION")));

    let headless = args.headless;

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            let message = "This application has already been started";
            if headless {
                eprintln!("{}", message);
            } else if let Err(err) = msgbox::create(concat!("Step Sense ", env!("CARGO_PKG_VERSION")), message, IconType::Error) {
                eprintln!("Failed to create msgbox: {:?}", err);
            }
            Ok(())
        },
        Err(err) => {
            if headless {
                eprintln!("Unexpected error: {}", err);
            } else {
                error_msgbox("Unexpected error", &err);
            }
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
