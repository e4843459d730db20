use launchguard_core::ProcessIdProbe;

/// Spawner for the platform this crate was compiled for
#[cfg(unix)]
pub type PlatformSpawner = launchguard_unix::UnixProcessSpawner;

/// Spawner for the platform this crate was compiled for
#[cfg(windows)]
pub type PlatformSpawner = launchguard_windows::WindowsProcessSpawner;

/// Create the process id probe for the platform this crate was compiled for
pub fn platform_probe() -> Box<dyn ProcessIdProbe> {
    #[cfg(target_os = "freebsd")]
    return Box::new(launchguard_unix::FreeBsdProcessIdProbe::new());

    #[cfg(all(unix, not(target_os = "freebsd")))]
    return Box::new(launchguard_unix::UnixProcessIdProbe::new());

    #[cfg(windows)]
    return Box::new(launchguard_windows::WindowsProcessIdProbe::new());

    #[cfg(not(any(unix, windows)))]
    Box::new(launchguard_core::NoPidLookup)
}

pub fn platform_name() -> &'static str {
    #[cfg(unix)]
    return launchguard_unix::UnixPlatform::platform_name();

    #[cfg(windows)]
    return launchguard_windows::WindowsPlatform::platform_name();

    #[cfg(not(any(unix, windows)))]
    "Unknown"
}
