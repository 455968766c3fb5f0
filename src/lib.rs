//! guestreel - Guest video capture and keepsake compilation.
//!
//! This is the on-device media engine behind the event app: guests record
//! short video responses (countdown, bounded duration, a prompt that
//! switches partway through), review and submit them, and the organizer
//! later composites every submission onto one canvas and re-encodes the
//! lot into a single downloadable keepsake. No server-side transcoding
//! anywhere.

pub mod acquire;
pub mod capability;
pub mod capture;
pub mod clip;
pub mod compile;
pub mod compose;
pub mod decode;
pub mod download;
pub mod mux;
pub mod review;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for embedding applications
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestreel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::info!("guestreel v{} ready", env!("CARGO_PKG_VERSION"));
}
