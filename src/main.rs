// Entry point: loads config, binds a shape to a rotor manager and prints the
// settled rotor states.
use clap::Parser;
use std::error::Error;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use epicycles::app::App;
use epicycles::cli::Args;
use epicycles::config::AppConfig;
use epicycles::core::CancelToken;
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config);
    if let Err(err) = init_tracing(&config.logging.filter) {
        eprintln!("Failed to initialise logging: {err}");
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let cancel = CancelToken::new();
    {
        let stop_flag = stop_flag.clone();
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            stop_flag.store(true, Ordering::SeqCst);
            cancel.cancel();
        })?;
    }

    let mut app = App::new(args, &config, stop_flag, cancel)?;
    let summary = app.run();

    println!(
        "{}: {} rotors ({} cached){}",
        summary.function,
        summary.rotor_count,
        summary.cached_states,
        if summary.interrupted { ", interrupted" } else { "" }
    );
    println!("{:>12} {:>14} {:>10}", "frequency", "magnitude", "phase");
    for state in &summary.states {
        println!(
            "{:>12.3} {:>14.6e} {:>10.4}",
            state.frequency,
            state.magnitude(),
            state.phase()
        );
    }
    println!("magnitude scale sum: {:.6}", summary.magnitude_sum);
    Ok(())
}
