//! Scene description: objects, emitters, camera.

mod camera;
mod demo;
mod geometry;

pub use camera::CameraRig;
pub use demo::DemoScene;
pub use geometry::{
    bounding_sphere, build_index, flatten, validate_scene, Shape, MAX_EMITTERS, MAX_OBJECTS,
    SHAPE_FLOATS, SHAPE_VERTICES,
};
