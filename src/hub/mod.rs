mod builder;
mod camera_hub;
mod status;
mod supervisor;
#[cfg(test)]
mod tests;

pub use builder::CameraHubBuilder;
pub use camera_hub::CameraHub;
pub use status::CameraStatus;
