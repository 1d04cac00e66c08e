use crate::config::Config;
use crate::dispatcher::TaskDispatcher;
use crate::event_wait::EventWait;
use crate::frame_scheduler::FrameScheduler;
use crate::loop_bound::LoopBound;
use crate::overlay::{OverlayContent, OverlayRenderer, OverlayState};
use crate::vr::{IntSize, Overlay, VrResult, VrRuntime, VrSession};
use crate::VrOverlayResult;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Owns the VR session and drives one overlay from the dispatcher's loop thread.
pub struct OverlayApplication {
    session: VrSession,
    config: Config,
}

impl OverlayApplication {
    pub fn new(runtime: Arc<dyn VrRuntime>, config: Config) -> VrOverlayResult<Self> {
        let session = VrSession::initialize(runtime)?;
        Ok(Self { session, config })
    }

    pub fn session(&self) -> &VrSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the overlay and runs `dispatcher`'s loop on the calling thread until it is stopped.
    ///
    /// `setup` receives a handle before the first frame is rendered. It runs on the loop thread,
    /// so the handle can be moved to worker threads from there.
    pub fn run<W, C, S>(
        mut self,
        dispatcher: &TaskDispatcher,
        events: &mut W,
        content: C,
        setup: S,
    ) -> VrOverlayResult<()>
    where
        W: EventWait + ?Sized,
        C: OverlayContent,
        S: FnOnce(OverlayAppHandle<C>),
    {
        let overlay = self
            .session
            .create_overlay(&self.config.overlay_key, &self.config.overlay_name)?;

        let result = match Self::configure(&overlay, &self.config) {
            Ok(()) => self.drive(dispatcher, events, &overlay, content, setup),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = overlay.destroy() {
            warn!("Failed to destroy overlay: {e}");
        }
        self.session.shutdown();
        result
    }

    fn configure(overlay: &Overlay, config: &Config) -> VrResult<()> {
        overlay.set_width_in_meters(config.width_in_meters)?;
        overlay.set_alpha(config.alpha)?;
        overlay.set_transform_absolute(config.tracking_origin, &config.transform())?;
        if config.visible {
            overlay.show()?;
        }
        debug!("Configured overlay {overlay:?}");
        Ok(())
    }

    fn drive<W, C, S>(
        &self,
        dispatcher: &TaskDispatcher,
        events: &mut W,
        overlay: &Overlay,
        content: C,
        setup: S,
    ) -> VrOverlayResult<()>
    where
        W: EventWait + ?Sized,
        C: OverlayContent,
        S: FnOnce(OverlayAppHandle<C>),
    {
        let renderer = LoopBound::new(
            dispatcher.clone(),
            OverlayRenderer::new(
                overlay.clone(),
                OverlayState::new(self.config.overlay_size()),
                self.config.background(),
                content,
            ),
        )?;

        let frame_renderer = renderer.clone();
        let frames = FrameScheduler::new(dispatcher.clone(), move || {
            match frame_renderer.with(|renderer| renderer.render()) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to render overlay frame: {e}"),
                Err(e) => error!("Could not reach overlay renderer: {e}"),
            }
        });

        setup(OverlayAppHandle {
            dispatcher: dispatcher.clone(),
            overlay: overlay.clone(),
            renderer: renderer.clone(),
            frames: frames.clone(),
        });
        frames.schedule_frame();

        info!("Running overlay '{}'", self.config.overlay_key);
        let result = dispatcher.run_loop(events);

        // Handles still held elsewhere must not drop the surface off this thread.
        match renderer.release() {
            Ok(released) => drop(released),
            Err(e) => warn!("Failed to release overlay renderer: {e}"),
        }
        Ok(result?)
    }
}

/// Cloneable handle for steering a running [`OverlayApplication`] from any thread.
pub struct OverlayAppHandle<C: OverlayContent> {
    dispatcher: TaskDispatcher,
    overlay: Overlay,
    renderer: LoopBound<OverlayRenderer<C>>,
    frames: FrameScheduler,
}

impl<C: OverlayContent> OverlayAppHandle<C> {
    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Mutates the content on the loop thread, then schedules a frame.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        let frames = self.frames.clone();
        self.renderer.access(move |renderer| {
            f(renderer.content_mut());
            frames.schedule_frame();
        });
    }

    pub fn resize(&self, size: IntSize) {
        let frames = self.frames.clone();
        self.renderer.access(move |renderer| {
            renderer.resize(size);
            frames.schedule_frame();
        });
    }

    pub fn set_visible(&self, visible: bool) {
        self.renderer.access(move |renderer| {
            if let Err(e) = renderer.overlay().set_visible(visible) {
                warn!("Failed to change overlay visibility: {e}");
            }
        });
    }

    pub fn request_frame(&self) {
        self.frames.schedule_frame();
    }

    pub async fn frames_rendered(&self) -> VrOverlayResult<u64> {
        Ok(self
            .renderer
            .access_async(|renderer| renderer.frames_rendered())
            .await?)
    }

    pub fn stop(&self) {
        self.dispatcher.shutdown();
    }
}

impl<C: OverlayContent> Clone for OverlayAppHandle<C> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            overlay: self.overlay.clone(),
            renderer: self.renderer.clone(),
            frames: self.frames.clone(),
        }
    }
}
