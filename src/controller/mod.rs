// CONTROLLER: AR session, per-frame animation and input
pub mod camera_controller;
pub mod frame_loop;
pub mod input;
pub mod session;

pub use camera_controller::CameraController;
pub use frame_loop::{animate, AnimationParams, Spin, Wave};
pub use input::{toggle_for, InputEvent, InputState};
pub use session::{AcquireTicket, ArSessionController, OverlayPolicy, PlacementState, ReticleState, SessionPhase};
