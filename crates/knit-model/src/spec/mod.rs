mod launch;
pub use launch::{ContainerRequest, LaunchSpec};
