use crate::dispatcher::{DispatchError, DispatchResult};
use crate::event_wait::{EventWait, EventWaker};
use log::{trace, warn};
use std::sync::{Arc, Mutex, PoisonError};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

/// User event posted to the winit loop to interrupt a blocking pump.
#[derive(Debug, Clone, Copy)]
pub struct NativeWake;

pub type NativeEventHandler = Box<dyn FnMut(&ActiveEventLoop, WindowId, WindowEvent)>;

/// Blocks on the platform's windowing event queue. Must be created and waited on from the
/// thread winit accepts as its event loop thread (the main thread on most platforms).
pub struct WinitEventWait {
    event_loop: EventLoop<NativeWake>,
    proxy: Arc<Mutex<EventLoopProxy<NativeWake>>>,
    app: PumpApp,
}

pub struct WinitWaker {
    proxy: Arc<Mutex<EventLoopProxy<NativeWake>>>,
}

struct PumpApp {
    handler: Option<NativeEventHandler>,
}

impl WinitEventWait {
    pub fn new() -> DispatchResult<Self> {
        let event_loop = EventLoop::<NativeWake>::with_user_event()
            .build()
            .map_err(|e| DispatchError::EventSource(format!("Failed to create event loop: {e}")))?;
        event_loop.set_control_flow(ControlFlow::Wait);
        let proxy = Arc::new(Mutex::new(event_loop.create_proxy()));

        Ok(Self {
            event_loop,
            proxy,
            app: PumpApp { handler: None },
        })
    }

    /// Routes native window events to `handler` while the loop is waiting.
    pub fn with_handler(mut self, handler: NativeEventHandler) -> Self {
        self.app.handler = Some(handler);
        self
    }
}

impl EventWait for WinitEventWait {
    fn waker(&self) -> Arc<dyn EventWaker> {
        Arc::new(WinitWaker {
            proxy: self.proxy.clone(),
        })
    }

    fn wait(&mut self) -> DispatchResult<()> {
        match self.event_loop.pump_app_events(None, &mut self.app) {
            PumpStatus::Continue => Ok(()),
            PumpStatus::Exit(code) => Err(DispatchError::EventSource(format!(
                "Native event loop exited with code {code}"
            ))),
        }
    }
}

impl EventWaker for WinitWaker {
    fn post_wake(&self) {
        let proxy = self.proxy.lock().unwrap_or_else(PoisonError::into_inner);
        if proxy.send_event(NativeWake).is_err() {
            warn!("Could not wake native event loop, it has already closed");
        }
    }
}

impl ApplicationHandler<NativeWake> for PumpApp {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, _event: NativeWake) {
        trace!("Woken by task submission");
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if let Some(handler) = self.handler.as_mut() {
            handler(event_loop, id, event);
        }
    }
}
