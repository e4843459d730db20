//! launchguard - start external worker processes reliably
//!
//! A worker that dies right away with a known crash code, or that stays up
//! without ever showing up in the process table, is started again. Any
//! other early exit aborts.
//!
//! ```rust,no_run
//! use launchguard::{LaunchSpec, LauncherConfig, ProcessQuery, WorkerLauncher};
//!
//! async fn start_office() -> anyhow::Result<()> {
//!     let accept = "--accept=socket,host=127.0.0.1,port=2002;urp;";
//!     let spec = LaunchSpec::builder()
//!         .command("soffice")
//!         .args(["--headless", accept])
//!         .build()?;
//!     let config = LauncherConfig::builder()
//!         .spec(spec)
//!         .query(ProcessQuery::new("soffice", accept))
//!         .build()?;
//!
//!     let process = WorkerLauncher::new(config)?.start().await?;
//!     println!("office running with pid {:?}", process.pid());
//!     Ok(())
//! }
//! ```

mod factory;
mod launcher;

pub use factory::{PlatformSpawner, platform_name, platform_probe};
pub use launcher::WorkerLauncher;

// Re-export core functionality
pub use launchguard_core::*;
