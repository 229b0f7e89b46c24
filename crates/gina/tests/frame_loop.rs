use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use gina::{
    AdapterSelector, DeviceDesc, GraphicsDevice, SurfaceHandle,
    backend::{
        RawInstance,
        sim::{ExecutionMode, GpuEvent, SimAdapterDesc, SimBackend, SimInstance},
    },
    raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle},
};

fn handle() -> SurfaceHandle {
    SurfaceHandle::new(
        RawWindowHandle::Xlib(XlibWindowHandle::new(3)),
        RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
    )
}

fn manual_device() -> GraphicsDevice<SimBackend> {
    let instance = SimInstance::builder()
        .execution_mode(ExecutionMode::Manual)
        .build();
    GraphicsDevice::new_from_instance(instance, &handle(), DeviceDesc::new(1280, 720))
        .expect("Failed to create device")
}

///Records, submits, presents and signals one frame through the raw components.
fn raw_frame(device: &mut GraphicsDevice<SimBackend>, label: &str) -> (usize, u64) {
    let slot = device.current_back_buffer_index();
    device
        .command_submitter_mut()
        .reset_command_list(slot)
        .unwrap();
    device.recorder().unwrap().record(label).unwrap();
    device.command_submitter_mut().close_command_list().unwrap();
    device.execute_command_list().unwrap();
    device.present().unwrap();
    (slot, device.signal().unwrap())
}

#[test]
fn two_frames_end_to_end() {
    let mut device = manual_device();
    let gpu = device.device().gpu().clone();
    let _immediate = gpu.immediate_on_drop();

    assert_eq!(device.command_submitter().buffer_count(), 2);
    assert_eq!(device.presentation_surface().buffer_count(), 2);
    assert_eq!(device.fence().current_value(), 0);
    assert!(device.presentation_surface().vsync());

    assert_eq!(raw_frame(&mut device, "frame 1"), (0, 1));
    assert_eq!(raw_frame(&mut device, "frame 2"), (1, 2));

    //nothing retired yet, the wait has to block until the GPU catches up
    let returned = AtomicBool::new(false);
    let fence = device.fence();
    std::thread::scope(|s| {
        //releases the waiter if an assertion below fails
        let _release = gpu.immediate_on_drop();
        s.spawn(|| {
            fence.wait_on_cpu(1).unwrap();
            returned.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(20));
        assert!(!returned.load(Ordering::SeqCst));
        gpu.run_until_stalled();
    });
    assert!(returned.load(Ordering::SeqCst));
    assert!(device.fence().completed_value() >= 1);

    let fence_id = device.fence().raw().id();
    assert_eq!(
        gpu.timeline(),
        vec![
            GpuEvent::Command("frame 1".to_owned()),
            GpuEvent::Present(0),
            GpuEvent::Signal {
                fence: fence_id,
                value: 1
            },
            GpuEvent::Command("frame 2".to_owned()),
            GpuEvent::Present(1),
            GpuEvent::Signal {
                fence: fence_id,
                value: 2
            },
        ]
    );
}

#[test]
fn wait_returns_only_after_completion() {
    let mut device = manual_device();
    let gpu = device.device().gpu().clone();
    let _immediate = gpu.immediate_on_drop();
    raw_frame(&mut device, "a");
    raw_frame(&mut device, "b");

    let fence = device.fence();
    std::thread::scope(|s| {
        let waiter = s.spawn(|| {
            fence.wait_on_cpu(2).unwrap();
            fence.completed_value()
        });

        //retire op by op, the waiter can't see 2 before the last signal retired
        while gpu.step() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(waiter.join().unwrap() >= 2);
    });
}

#[test]
fn slots_follow_back_buffers() {
    let instance = SimInstance::builder().build();
    let mut device = GraphicsDevice::<SimBackend>::new_from_instance(
        instance,
        &handle(),
        DeviceDesc::new(640, 480).with_buffer_count(3),
    )
    .unwrap();

    let slots = (0..7)
        .map(|_| {
            let slot = device.begin_frame().unwrap();
            device.end_frame().unwrap();
            slot
        })
        .collect::<Vec<_>>();
    assert_eq!(slots, [0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(device.fence().current_value(), 7);
}

#[test]
fn safe_protocol_never_resets_busy_allocator() {
    let mut device = manual_device();
    let gpu = device.device().gpu().clone();
    let _immediate = gpu.immediate_on_drop();

    //a background "GPU" that retires work slowly, until the guard switches to immediate execution
    std::thread::scope(|s| {
        let _stop = gpu.immediate_on_drop();
        s.spawn(|| {
            while gpu.mode() == ExecutionMode::Manual {
                gpu.step();
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        for i in 0..6 {
            device.begin_frame().unwrap();
            device
                .recorder()
                .unwrap()
                .record(format!("frame {}", i))
                .unwrap();
            device.end_frame().unwrap();
        }
        device.flush_command_queue().unwrap();
    });

    let commands = gpu
        .timeline()
        .into_iter()
        .filter(|e| matches!(e, GpuEvent::Command(_)))
        .count();
    assert_eq!(commands, 6);
}

#[test]
fn flush_twice_does_no_gpu_work() {
    let instance = SimInstance::builder().build();
    let mut device =
        GraphicsDevice::<SimBackend>::new_from_instance(instance, &handle(), DeviceDesc::default())
            .unwrap();
    device.begin_frame().unwrap();
    device.recorder().unwrap().record("draw").unwrap();
    device.end_frame().unwrap();

    let gpu = device.device().gpu().clone();
    let first = device.flush_command_queue().unwrap();
    let work_after_first = gpu
        .timeline()
        .iter()
        .filter(|e| !matches!(e, GpuEvent::Signal { .. }))
        .count();
    let second = device.flush_command_queue().unwrap();
    let work_after_second = gpu
        .timeline()
        .iter()
        .filter(|e| !matches!(e, GpuEvent::Signal { .. }))
        .count();

    assert_eq!(work_after_first, work_after_second);
    assert_eq!(device.fence().completed_value(), second);
    assert!(second > first);
}

#[test]
fn selection_never_picks_software() {
    let instance = SimInstance::builder()
        .with_adapter(SimAdapterDesc::software("Software Rasterizer"))
        .with_adapter(SimAdapterDesc::integrated("Integrated"))
        .with_adapter(SimAdapterDesc::software("Another Rasterizer"))
        .build();

    for prefer in [true, false] {
        let adapter = AdapterSelector::<SimBackend>::new(&instance)
            .find_adapter(prefer)
            .unwrap();
        assert!(!adapter.info().is_software);
    }

    let device =
        GraphicsDevice::<SimBackend>::new_from_instance(instance, &handle(), DeviceDesc::default())
            .unwrap();
    assert_eq!(device.adapter_info().name, "Integrated");
}

#[test]
fn lost_device_fails_waits() {
    let mut device = manual_device();
    let gpu = device.device().gpu().clone();
    let (_, value) = raw_frame(&mut device, "doomed");

    let fence = device.fence();
    std::thread::scope(|s| {
        let waiter = s.spawn(|| fence.wait_on_cpu(value));
        std::thread::sleep(Duration::from_millis(10));
        gpu.lose_device();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(gina::FenceError::DeviceLost(v)) if v == value
        ));
    });
    assert_eq!(device.fence().completed_value(), u64::MAX);
}

#[test]
fn validation_request_without_layer() {
    let instance = SimInstance::builder()
        .without_validation_layer()
        .validation(true)
        .build();
    assert!(!instance.validation_enabled());
    let device =
        GraphicsDevice::<SimBackend>::new_from_instance(instance, &handle(), DeviceDesc::default());
    assert!(device.is_ok());
}
