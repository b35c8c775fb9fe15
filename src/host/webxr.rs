//! Browser WebXR device API, reached through `js_sys::Reflect` so no
//! unstable `web-sys` bindings are required.
use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;
use js_sys::{Array, Float32Array, Function, Object, Promise, Reflect};
use tracing::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use super::{ReferenceSpaceKind, SessionEvent, SessionFeatures, XrBackend};
use crate::error::XrError;
use crate::model::ViewerPose;

pub struct WebXrSpace(JsValue);
pub struct WebXrHitTestSource(JsValue);

/// The `XRFrame` handed to a session animation-frame callback.
pub struct WebXrFrame(pub JsValue);

fn describe(e: &JsValue) -> String {
    e.as_string()
        .or_else(|| Reflect::get(e, &JsValue::from_str("message")).ok().and_then(|m| m.as_string()))
        .unwrap_or_else(|| format!("{e:?}"))
}

fn host_error(e: JsValue) -> XrError {
    XrError::Host(describe(&e))
}

fn get(target: &JsValue, key: &str) -> Result<JsValue, XrError> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(host_error)
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), XrError> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ()).map_err(host_error)
}

fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let f: Function = Reflect::get(target, &JsValue::from_str(method))?
        .dyn_into()
        .map_err(|_| JsValue::from_str(&format!("{method} is not a function")))?;
    let args: Array = args.iter().collect();
    Reflect::apply(&f, target, &args)
}

async fn call_async(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let promise: Promise = call(target, method, args)?.dyn_into()?;
    JsFuture::from(promise).await
}

fn string_array(items: &[&str]) -> Array {
    items.iter().map(|s| JsValue::from_str(s)).collect()
}

/// Column-major `Float32Array` of 16 elements.
fn matrix(value: &JsValue) -> Option<Mat4> {
    let array: Float32Array = value.clone().dyn_into().ok()?;
    let cols = array.to_vec();
    (cols.len() == 16).then(|| Mat4::from_cols_slice(&cols))
}

fn pose_matrix(pose: &JsValue) -> Option<Mat4> {
    let transform = get(pose, "transform").ok()?;
    matrix(&get(&transform, "matrix").ok()?)
}

/// Pose of the first hit-test result only; later candidates are never used.
fn first_pose(results: &Array, pose_of: impl Fn(&JsValue) -> Option<JsValue>) -> Option<Mat4> {
    if results.length() == 0 {
        return None;
    }
    let pose = pose_of(&results.get(0))?;
    if pose.is_null() || pose.is_undefined() {
        return None;
    }
    pose_matrix(&pose)
}

struct SessionHandle {
    session: JsValue,
    listeners: Vec<Closure<dyn FnMut(JsValue)>>,
}

impl SessionHandle {
    /// The host may still fire `end` after we let go of the session, so the
    /// listeners are never freed.
    fn forget(self) {
        for listener in self.listeners {
            listener.forget();
        }
    }
}

pub struct WebXr {
    overlay_root: JsValue,
    session: RefCell<Option<SessionHandle>>,
    inbox: Rc<RefCell<Vec<SessionEvent>>>,
    on_end: RefCell<Option<Rc<dyn Fn()>>>,
}

impl WebXr {
    /// `overlay_root` is shown over the camera feed when DOM overlay is granted.
    pub fn new(overlay_root: web_sys::Element) -> Self {
        Self {
            overlay_root: overlay_root.into(),
            session: RefCell::new(None),
            inbox: Rc::new(RefCell::new(Vec::new())),
            on_end: RefCell::new(None),
        }
    }

    /// Called once the session has ended, on top of queuing [`SessionEvent::End`].
    pub fn set_on_end(&self, hook: Rc<dyn Fn()>) {
        *self.on_end.borrow_mut() = Some(hook);
    }

    /// Select and end events received since the last call.
    pub fn take_events(&self) -> Vec<SessionEvent> {
        let events = std::mem::take(&mut *self.inbox.borrow_mut());
        if events.contains(&SessionEvent::End) {
            if let Some(handle) = self.session.borrow_mut().take() {
                handle.forget();
            }
        }
        events
    }

    pub fn session_active(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Schedule `callback(time, frame)` for the next XR frame.
    pub fn request_frame(&self, callback: &Function) -> bool {
        match self.session.borrow().as_ref() {
            Some(handle) => call(&handle.session, "requestAnimationFrame", &[callback.clone().into()]).is_ok(),
            None => false,
        }
    }

    fn xr_system() -> Result<JsValue, XrError> {
        let window = web_sys::window().ok_or_else(|| XrError::Unavailable("no window".into()))?;
        let xr = get(&window.navigator().into(), "xr")?;
        if xr.is_undefined() || xr.is_null() {
            return Err(XrError::Unavailable("WebXR not supported by this browser".into()));
        }
        Ok(xr)
    }

    fn session_init(&self, features: &SessionFeatures) -> Result<Object, XrError> {
        let init = Object::new();
        set(&init, "requiredFeatures", &string_array(&features.required))?;
        set(&init, "optionalFeatures", &string_array(&features.optional))?;
        let overlay = Object::new();
        set(&overlay, "root", &self.overlay_root)?;
        set(&init, "domOverlay", &overlay)?;
        Ok(init)
    }

    /// Immersive sessions only produce frames with a base layer. Content is
    /// drawn into the DOM overlay, so the layer only has to exist.
    fn attach_base_layer(session: &JsValue) -> Result<(), JsValue> {
        let document = web_sys::window().and_then(|w| w.document()).ok_or("no document")?;
        let canvas = document.create_element("canvas")?;
        let attrs = Object::new();
        Reflect::set(&attrs, &"xrCompatible".into(), &JsValue::TRUE)?;
        Reflect::set(&attrs, &"alpha".into(), &JsValue::TRUE)?;
        let gl = call(&canvas, "getContext", &[JsValue::from_str("webgl2"), attrs.into()])?;
        if gl.is_null() {
            return Err("WebGL2 unavailable for the XR layer".into());
        }
        let ctor: Function = Reflect::get(&js_sys::global(), &"XRWebGLLayer".into())?.dyn_into()?;
        let layer = Reflect::construct(&ctor, &Array::of2(session, &gl))?;
        let state = Object::new();
        Reflect::set(&state, &"baseLayer".into(), &layer)?;
        call(session, "updateRenderState", &[state.into()])?;
        Ok(())
    }

    fn listen(&self, session: &JsValue) -> Result<Vec<Closure<dyn FnMut(JsValue)>>, XrError> {
        let select = {
            let inbox = Rc::clone(&self.inbox);
            Closure::wrap(Box::new(move |_e: JsValue| {
                inbox.borrow_mut().push(SessionEvent::Select);
            }) as Box<dyn FnMut(JsValue)>)
        };
        let end = {
            let inbox = Rc::clone(&self.inbox);
            let hook = self.on_end.borrow().clone();
            Closure::wrap(Box::new(move |_e: JsValue| {
                debug!("XR session ended by the host");
                inbox.borrow_mut().push(SessionEvent::End);
                if let Some(hook) = &hook {
                    hook();
                }
            }) as Box<dyn FnMut(JsValue)>)
        };
        for (name, closure) in [("select", &select), ("end", &end)] {
            call(session, "addEventListener", &[JsValue::from_str(name), closure.as_ref().clone()]).map_err(host_error)?;
        }
        Ok(vec![select, end])
    }
}

impl XrBackend for WebXr {
    type Space = WebXrSpace;
    type HitTestSource = WebXrHitTestSource;
    type Frame = WebXrFrame;

    async fn request_session(&self, features: &SessionFeatures) -> Result<(), XrError> {
        let xr = Self::xr_system()?;
        let supported = call_async(&xr, "isSessionSupported", &[JsValue::from_str("immersive-ar")])
            .await
            .map_err(host_error)?;
        if !supported.is_truthy() {
            return Err(XrError::Unavailable("immersive-ar sessions are not supported on this device".into()));
        }

        let init = self.session_init(features)?;
        let session = call_async(&xr, "requestSession", &[JsValue::from_str("immersive-ar"), init.into()])
            .await
            .map_err(|e| XrError::Unavailable(describe(&e)))?;
        if let Err(e) = Self::attach_base_layer(&session) {
            warn!("no XR base layer, frames may not be delivered: {}", describe(&e));
        }
        let listeners = self.listen(&session)?;
        info!("WebXR session started");
        *self.session.borrow_mut() = Some(SessionHandle { session, listeners });
        Ok(())
    }

    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> Result<WebXrSpace, XrError> {
        let session = self
            .session
            .borrow()
            .as_ref()
            .map(|h| h.session.clone())
            .ok_or(XrError::ReferenceSpace(kind))?;
        call_async(&session, "requestReferenceSpace", &[JsValue::from_str(kind.as_str())])
            .await
            .map(WebXrSpace)
            .map_err(|e| {
                debug!("reference space rejected: {}", describe(&e));
                XrError::ReferenceSpace(kind)
            })
    }

    async fn request_hit_test_source(&self, space: &WebXrSpace) -> Result<WebXrHitTestSource, XrError> {
        let session = self
            .session
            .borrow()
            .as_ref()
            .map(|h| h.session.clone())
            .ok_or_else(|| XrError::HitTestSource("no active session".into()))?;
        let options = Object::new();
        set(&options, "space", &space.0)?;
        call_async(&session, "requestHitTestSource", &[options.into()])
            .await
            .map(WebXrHitTestSource)
            .map_err(|e| XrError::HitTestSource(describe(&e)))
    }

    fn hit_test(&self, frame: &WebXrFrame, source: &WebXrHitTestSource, space: &WebXrSpace) -> Vec<Mat4> {
        let Ok(results) = call(&frame.0, "getHitTestResults", &[source.0.clone()]) else {
            return Vec::new();
        };
        // the host orders candidates; a first hit without a pose means no hit this frame
        first_pose(&Array::from(&results), |result| call(result, "getPose", &[space.0.clone()]).ok())
            .into_iter()
            .collect()
    }

    fn viewer_pose(&self, frame: &WebXrFrame, space: &WebXrSpace) -> Option<ViewerPose> {
        let pose = call(&frame.0, "getViewerPose", &[space.0.clone()]).ok()?;
        if pose.is_null() || pose.is_undefined() {
            return None;
        }
        let transform = pose_matrix(&pose)?;
        let projection = get(&pose, "views")
            .ok()
            .map(|views| Array::from(&views).get(0))
            .filter(|view| !view.is_undefined())
            .and_then(|view| get(&view, "projectionMatrix").ok())
            .and_then(|m| matrix(&m));
        Some(ViewerPose { transform, projection })
    }

    fn release_hit_test_source(&self, source: WebXrHitTestSource) {
        if let Err(e) = call(&source.0, "cancel", &[]) {
            // cancelling after the session ended throws; the source is gone either way
            debug!("hit-test source cancel: {}", describe(&e));
        }
    }

    fn end_session(&self) {
        let Some(handle) = self.session.borrow_mut().take() else {
            return;
        };
        if let Err(e) = call(&handle.session, "end", &[]) {
            debug!("session end: {}", describe(&e));
        }
        handle.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    /// An `XRPose`-shaped object at `position`.
    fn pose_at(position: Vec3) -> JsValue {
        let cols = Mat4::from_translation(position).to_cols_array();
        let transform = Object::new();
        Reflect::set(&transform, &"matrix".into(), &Float32Array::from(&cols[..])).unwrap();
        let pose = Object::new();
        Reflect::set(&pose, &"transform".into(), &transform).unwrap();
        pose.into()
    }

    /// Hit results whose `getPose` answer is stored under `pose`.
    fn results(poses: Vec<JsValue>) -> Array {
        poses
            .into_iter()
            .map(|pose| {
                let result = Object::new();
                Reflect::set(&result, &"pose".into(), &pose).unwrap();
                JsValue::from(result)
            })
            .collect()
    }

    fn stored_pose(result: &JsValue) -> Option<JsValue> {
        Reflect::get(result, &"pose".into()).ok()
    }

    #[wasm_bindgen_test]
    fn test_first_result_wins() {
        let hits = results(vec![pose_at(Vec3::new(0.0, 0.0, -1.0)), pose_at(Vec3::new(2.0, 0.0, -1.0))]);
        let pose = first_pose(&hits, stored_pose).unwrap();
        assert_eq!(pose.w_axis.truncate(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[wasm_bindgen_test]
    fn test_first_result_without_pose_is_no_hit() {
        let hits = results(vec![JsValue::NULL, pose_at(Vec3::new(2.0, 0.0, -1.0))]);
        assert_eq!(first_pose(&hits, stored_pose), None);
        assert_eq!(first_pose(&Array::new(), stored_pose), None);
    }
}
