// Re-export all public modules so they can be used from main.rs
pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod shell;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod tasks;
pub mod view;

// AR host capability
pub mod host;

#[cfg(target_arch = "wasm32")]
pub use web::start;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use futures::future::LocalBoxFuture;
    use tracing::{error, info};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, HtmlCanvasElement, MouseEvent, Window};

    use crate::assets::{AssetSource, BuiltinAssets};
    use crate::host::webxr::{WebXr, WebXrFrame};
    use crate::host::{SessionEvent, Spawner};
    use crate::shell::{ArState, DemoRegistry, HostShell};
    use crate::tasks::{DemoId, TaskEnv};
    use crate::view::render::EguiFrame;
    use crate::view::ui::{self, UiView};
    use crate::view::{GpuContext, Renderer};
    use crate::logging;

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas()?;
        let width = canvas.width();
        let height = canvas.height();

        let gpu = GpuContext::new(&canvas, width, height)
            .await
            .map_err(|e| js_error(format!("GPU init failed: {e}")))?;

        let overlay_root = document.body().ok_or(js_error("no body on document"))?;
        let backend = Rc::new(WebXr::new(overlay_root.into()));
        let spawner: Spawner = Rc::new(|fut: LocalBoxFuture<'static, ()>| wasm_bindgen_futures::spawn_local(fut));
        let assets: Rc<dyn AssetSource> = Rc::new(BuiltinAssets);
        let env = TaskEnv { backend: Rc::clone(&backend), spawner, assets: Rc::clone(&assets) };
        let mut shell = HostShell::new(env, DemoRegistry::standard()).map_err(|e| js_error(e.to_string()))?;

        // `#torus` in the address launches that demo directly
        if let Ok(hash) = window.location().hash() {
            if let Some(key) = hash.strip_prefix('#').filter(|k| !k.is_empty()) {
                if let Err(e) = shell.launch_key(key) {
                    error!("{e}");
                }
            }
        }

        let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));
        setup_input_listeners(&document, &egui_events)?;

        let app = Rc::new(RefCell::new(WebApp {
            shell,
            backend: Rc::clone(&backend),
            renderer: Renderer::new(gpu, assets),
            egui_ctx: egui::Context::default(),
            egui_events,
            canvas,
        }));
        FrameDriver::start(window, backend, app);
        info!("artoys started");
        Ok(())
    }

    struct WebApp {
        shell: HostShell<WebXr>,
        backend: Rc<WebXr>,
        renderer: Renderer,
        egui_ctx: egui::Context,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
        canvas: HtmlCanvasElement,
    }

    impl WebApp {
        fn frame(&mut self, time_ms: f64, xr_frame: Option<&WebXrFrame>) {
            for event in self.backend.take_events() {
                match event {
                    SessionEvent::Select => self.shell.select(),
                    SessionEvent::End => self.shell.session_ended(),
                    SessionEvent::Start => {}
                }
            }

            let (w, h) = (self.canvas.width(), self.canvas.height());
            if (w, h) != self.renderer.size() {
                self.renderer.resize(w, h);
            }
            self.renderer.set_passthrough(self.shell.ar_state() == ArState::Running);

            let time = time_ms / 1000.0;
            self.shell.frame(time, xr_frame, &mut self.renderer);

            let raw_input = egui::RawInput {
                time: Some(time),
                screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(w as f32, h as f32))),
                events: std::mem::take(&mut *self.egui_events.borrow_mut()),
                ..Default::default()
            };
            let elements = self.shell.mount().elements();
            let demos: Vec<DemoId> = self.shell.demos().collect();
            let view = UiView {
                demos: &demos,
                active: self.shell.active(),
                elements: &elements,
                ar: self.shell.ar_state(),
                status: self.shell.status(),
            };
            let (output, actions) = ui::build_ui(&self.egui_ctx, raw_input, &view);

            let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);
            self.renderer.finish_frame(EguiFrame {
                primitives,
                textures_delta: output.textures_delta,
                pixels_per_point: output.pixels_per_point,
            });

            for action in actions {
                self.shell.handle(action);
            }
        }
    }

    type WindowCallback = Closure<dyn FnMut(f64)>;
    type XrCallback = Closure<dyn FnMut(f64, JsValue)>;

    /// Drives frames from the window while no AR session runs, and from the
    /// session's own animation frames while one does.
    #[derive(Clone)]
    struct FrameDriver {
        window: Window,
        backend: Rc<WebXr>,
        on_window: Rc<RefCell<Option<WindowCallback>>>,
        on_xr: Rc<RefCell<Option<XrCallback>>>,
        window_pending: Rc<Cell<bool>>,
    }

    impl FrameDriver {
        fn start(window: Window, backend: Rc<WebXr>, app: Rc<RefCell<WebApp>>) {
            let driver = FrameDriver {
                window,
                backend: Rc::clone(&backend),
                on_window: Rc::new(RefCell::new(None)),
                on_xr: Rc::new(RefCell::new(None)),
                window_pending: Rc::new(Cell::new(false)),
            };

            *driver.on_window.borrow_mut() = Some(Closure::wrap(Box::new({
                let driver = driver.clone();
                let app = Rc::clone(&app);
                move |time: f64| {
                    driver.window_pending.set(false);
                    app.borrow_mut().frame(time, None);
                    driver.schedule();
                }
            }) as Box<dyn FnMut(f64)>));

            *driver.on_xr.borrow_mut() = Some(Closure::wrap(Box::new({
                let driver = driver.clone();
                move |time: f64, frame: JsValue| {
                    app.borrow_mut().frame(time, Some(&WebXrFrame(frame)));
                    driver.schedule();
                }
            }) as Box<dyn FnMut(f64, JsValue)>));

            // pending session frames never fire once the session is gone
            backend.set_on_end(Rc::new({
                let driver = driver.clone();
                move || driver.schedule_window()
            }));

            driver.schedule();
        }

        fn schedule(&self) {
            if self.backend.session_active() {
                if let Some(cb) = self.on_xr.borrow().as_ref() {
                    if self.backend.request_frame(cb.as_ref().unchecked_ref()) {
                        return;
                    }
                }
            }
            self.schedule_window();
        }

        fn schedule_window(&self) {
            if self.window_pending.get() {
                return;
            }
            if let Some(cb) = self.on_window.borrow().as_ref() {
                match self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(_) => self.window_pending.set(true),
                    Err(e) => error!("requestAnimationFrame failed: {e:?}"),
                }
            }
        }
    }

    /// Pointer input for egui. AR taps arrive as session `select` events instead.
    fn setup_input_listeners(document: &Document, egui_events: &Rc<RefCell<Vec<egui::Event>>>) -> Result<(), JsValue> {
        let pointer = |e: &MouseEvent| egui::pos2(e.client_x() as f32, e.client_y() as f32);

        let moved = {
            let events = Rc::clone(egui_events);
            Closure::wrap(Box::new(move |e: MouseEvent| {
                events.borrow_mut().push(egui::Event::PointerMoved(pointer(&e)));
            }) as Box<dyn FnMut(MouseEvent)>)
        };
        let button = |pressed: bool| {
            let events = Rc::clone(egui_events);
            Closure::wrap(Box::new(move |e: MouseEvent| {
                let pos = pointer(&e);
                let mut events = events.borrow_mut();
                events.push(egui::Event::PointerMoved(pos));
                events.push(egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    modifiers: egui::Modifiers::default(),
                });
            }) as Box<dyn FnMut(MouseEvent)>)
        };

        for (name, closure) in [("pointermove", moved), ("pointerdown", button(true)), ("pointerup", button(false))] {
            document.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        Ok(())
    }

    fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        let width = window.inner_width()?.as_f64().unwrap_or(800.0) as u32;
        let height = window.inner_height()?.as_f64().unwrap_or(600.0) as u32;
        canvas_el.set_width(width.max(1));
        canvas_el.set_height(height.max(1));
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }
}
