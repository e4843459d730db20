//! Unix process id probes and worker spawner

mod unix_probe;
#[cfg(unix)]
mod unix_spawner;

pub use unix_probe::{FreeBsdProcessIdProbe, UnixProcessIdProbe};
#[cfg(unix)]
pub use unix_spawner::{UnixProcessHandle, UnixProcessSpawner};

pub struct UnixPlatform;

impl UnixPlatform {
    pub fn platform_name() -> &'static str {
        if cfg!(target_os = "freebsd") {
            "FreeBSD"
        } else {
            "Unix"
        }
    }
}
