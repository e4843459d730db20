//! Windows process id probe and worker spawner

mod windows_probe;
mod windows_spawner;

pub use windows_probe::WindowsProcessIdProbe;
pub use windows_spawner::WindowsProcessSpawner;

pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn platform_name() -> &'static str {
        "Windows"
    }
}
