use log::{error, info};
use std::sync::Arc;
use vroverlay_core::event_wait::{CondvarEventWait, EventWait, WinitEventWait};
use vroverlay_core::vr::mock::MockRuntime;
use vroverlay_core::vr::VrRuntime;
use vroverlay_core::{Config, OverlayApplication, TaskDispatcher, VrOverlayResult};

mod cli;
mod demo;
mod logger;

use cli::Args;
use demo::DemoContent;

fn main() -> VrOverlayResult<()> {
    let args = cli::parse_args();
    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting VR Overlay {}", vroverlay_core::version());

    let config = load_config(&args)?;
    if args.dry_run {
        info!("Configuration is valid");
        return Ok(());
    }

    let mut events: Box<dyn EventWait> = if args.headless {
        Box::new(CondvarEventWait::new())
    } else {
        Box::new(WinitEventWait::new()?)
    };
    let dispatcher = TaskDispatcher::new(events.waker());

    let ctrlc_dispatcher = dispatcher.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down...");
        ctrlc_dispatcher.shutdown();
    })
    .map_err(|e| format!("Error setting Ctrl+C handler: {e}"))?;

    let app = OverlayApplication::new(create_runtime(&args), config)?;

    let mut ticker = None;
    app.run(
        &dispatcher,
        events.as_mut(),
        DemoContent::default(),
        |handle| ticker = Some(demo::spawn_ticker(handle)),
    )?;

    if let Some(ticker) = ticker {
        if ticker.join().is_err() {
            error!("Demo ticker thread panicked");
        }
    }

    info!("VR Overlay stopped");
    Ok(())
}

fn load_config(args: &Args) -> VrOverlayResult<Config> {
    let config = if args.use_defaults {
        info!("Using default configuration");
        Config::default()
    } else {
        // A dry run must not rewrite the file it is checking.
        Config::load(args.config_path.as_deref(), !args.dry_run)?
    };

    if let Some(path) = &config.config_path {
        info!("Loaded configuration from {}", path.display());
    }
    config.validate()?;
    Ok(config)
}

fn create_runtime(args: &Args) -> Arc<dyn VrRuntime> {
    if !args.mock {
        if let Some(runtime) = native_runtime() {
            return runtime;
        }
    }

    info!("Using the in-memory mock VR runtime");
    Arc::new(MockRuntime::new())
}

#[cfg(feature = "openvr")]
fn native_runtime() -> Option<Arc<dyn VrRuntime>> {
    info!("Using the OpenVR runtime");
    Some(Arc::new(vroverlay_core::vr::openvr::OpenVrRuntime::new()))
}

#[cfg(not(feature = "openvr"))]
fn native_runtime() -> Option<Arc<dyn VrRuntime>> {
    log::warn!("Built without the openvr feature, falling back to the mock VR runtime");
    None
}
