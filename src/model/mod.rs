// MODEL: Demo state and data
pub mod camera;
pub mod configuration;
pub mod geometry;
pub mod lights;
pub mod material;
pub mod object;
pub mod registry;

pub use camera::{Camera, ViewerPose};
pub use configuration::{ConfigurationState, LightKind, LightSettings, Speed, Toggle, ToggleRules};
pub use geometry::{MeshData, Primitive};
pub use lights::{HemisphereLight, KeyLight, SceneLights};
pub use material::{Color, MaterialDescriptor, MaterialInputs, MaterialVariant, TextureRef};
pub use object::{Geometry, ModelPart, ModelTemplate, PlaceableObject, Transform};
pub use registry::{MaterialBinding, ObjectRegistry, SelectionMode};
