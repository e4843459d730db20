use async_trait::async_trait;
use launchguard_core::{ChildProcessHandle, LaunchError, LaunchSpec, ProcessSpawner, command_for};

/// Creates the process without a console window (CREATE_NO_WINDOW)
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Starts background workers without popping up a console
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProcessSpawner;

#[async_trait]
impl ProcessSpawner for WindowsProcessSpawner {
    type Handle = ChildProcessHandle;

    async fn spawn(&self, spec: &LaunchSpec) -> Result<ChildProcessHandle, LaunchError> {
        #[allow(unused_mut)]
        let mut cmd = command_for(spec);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        ChildProcessHandle::spawn(cmd, spec)
    }
}
