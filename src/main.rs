// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;
mod sink;

use args::Args;
use clap::Parser;
use edgefirst_capture::{CameraConfig, FramePipeline, PatternDriver, Requester};
use std::{error::Error, fs, sync::Arc, time::Duration};
use tokio::{
    signal,
    sync::Notify,
    time::{self, MissedTickBehavior},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

const TICK: Duration = Duration::from_millis(10);

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("journald logging unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(journald);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;
    info!("EdgeFirst Camera Frame Capture");

    let config = CameraConfig::try_from(&args)?;
    fs::create_dir_all(&args.output)?;

    let wake = Arc::new(Notify::new());
    let (listener, images) = sink::channel();

    let mut camera = FramePipeline::new(config);
    camera.add_listener(listener);
    {
        let wake = wake.clone();
        camera.set_wake(move || wake.notify_one());
    }
    camera.setup(PatternDriver::new(args.fps));
    camera.log_config();
    if let Some(e) = camera.init_error() {
        return Err(format!("camera setup failed: {e}").into());
    }

    let mut writer = tokio::spawn(sink::write_images(
        images,
        args.output.clone(),
        args.frames,
    ));

    if args.stream {
        camera.start_stream(Requester::Api);
    }

    let mut tick = time::interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = wake.notified() => {}
            written = &mut writer => {
                info!("wrote {} images to {}", written??, args.output.display());
                break;
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }

        if !args.stream && camera.demand().single() == 0 && camera.current_image().is_none() {
            camera.request_image(Requester::Api);
        }
        camera.loop_once();

        if let Some(e) = camera.init_error() {
            error!("camera failed: {}", e);
            break;
        }
    }

    if args.stream {
        camera.stop_stream(Requester::Api);
    }
    let stats = camera.stats();
    info!(
        "published {} dropped {} invalid {} driver returns {} heap releases {}",
        stats.published, stats.dropped, stats.invalid, stats.driver_returns, stats.heap_releases
    );
    Ok(())
}
