//! intent_hub — entry point.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use intent_hub::app::run;
use intent_hub::settings::Args;

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Intent Hub — clap & gesture home assistant          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "mic")]
    println!("  Audio: microphone");
    #[cfg(not(feature = "mic"))]
    println!("  Audio: keyboard simulation  (use --features mic for hardware)");
    #[cfg(feature = "leap")]
    println!("  Hands: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Hands: keyboard simulation  (use --features leap for hardware)");
    println!();

    let cfg = match args.into_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cfg) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
