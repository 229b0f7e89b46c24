//! Drives the double buffered frame loop on the simulated backend.
//!
//! A second thread plays the GPU and retires queued work with a fixed latency, a third one plays the window and reports
//! a few resizes. Run with the number of frames as first argument.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use gina::{
    DeviceDesc, GraphicsDevice, SurfaceHandle,
    backend::sim::{ExecutionMode, SimBackend, SimGpu, SimInstance},
    raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle},
    resize,
};

///Time the simulated GPU needs per operation.
const GPU_LATENCY: Duration = Duration::from_millis(2);

fn run_gpu(gpu: &SimGpu, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        gpu.step();
        thread::sleep(GPU_LATENCY);
    }
}

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let frames = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u64>())
        .transpose()?
        .unwrap_or(120);

    //headless, the simulated backend never dereferences the handles
    let surface = SurfaceHandle::new(
        RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
        RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
    );
    let instance = SimInstance::builder()
        .execution_mode(ExecutionMode::Manual)
        .validation(true)
        .build();
    let mut device = GraphicsDevice::<SimBackend>::new_from_instance(
        instance,
        &surface,
        DeviceDesc::new(1280, 720).with_app_name("frame loop"),
    )?;

    let gpu = device.device().gpu().clone();
    let (notifier, resize_events) = resize::channel();
    let stop = AtomicBool::new(false);

    let start = Instant::now();
    let result = thread::scope(|s| -> Result<()> {
        s.spawn(|| run_gpu(&gpu, &stop));
        s.spawn(move || {
            for (width, height) in [(1024, 768), (0, 0), (1920, 1080)] {
                thread::sleep(Duration::from_millis(100));
                notifier.on_resize(width, height);
            }
        });

        let result = (|| -> Result<()> {
            for frame in 0..frames {
                if device.handle_resize_events(&resize_events)? {
                    let (width, height) = device.presentation_surface().extent();
                    log::info!("Frame {}: resized to {}x{}", frame, width, height);
                }

                let slot = device.begin_frame()?;
                let recorder = device.recorder()?;
                recorder.record(format!("clear frame {}", frame))?;
                recorder.record(format!("draw frame {}", frame))?;
                let value = device.end_frame()?;

                log::trace!(
                    "Frame {} on slot {} signals {}, GPU at {}",
                    frame,
                    slot,
                    value,
                    device.fence().completed_value()
                );
            }
            device.flush_command_queue()?;
            Ok(())
        })();

        stop.store(true, Ordering::Release);
        result
    });

    //no GPU thread anymore, let the teardown flush retire right away
    gpu.set_mode(ExecutionMode::Immediate);
    result?;

    let elapsed = start.elapsed();
    log::info!(
        "Rendered {} frames in {:?} ({:.1} fps), {} operations retired",
        frames,
        elapsed,
        frames as f64 / elapsed.as_secs_f64(),
        gpu.timeline().len()
    );

    Ok(())
}
