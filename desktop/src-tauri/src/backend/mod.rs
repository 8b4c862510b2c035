mod backend_settings;
mod config;
mod coordinator;
mod error;
mod health;
mod launch;
mod lifecycle_event;
mod lifecycle_state;
mod logging_settings;
mod port;
mod process;
mod readiness_settings;
mod resilience_settings;
mod supervisor;
mod terminate;
mod window_settings;

pub use backend_settings::BackendSettings;
pub use config::{
    CONFIG_FILENAME, CONFIG_VERSION, ENV_APP_ROOT, ENV_BASE_PORT, ENV_LOG_LEVEL, ENV_PYTHON,
    ShellConfig,
};
pub use coordinator::{CoordinatorHandle, LifecycleCoordinator, backend_url};
pub use error::{BackendError, Result as BackendResult};
pub use health::{HealthCheckResult, HttpProbe, ReadinessPoller, ReadinessProbe};
pub use launch::{LaunchPlan, PlanFactory, prepare_app_root, resolve_app_root, resolve_interpreter};
pub use lifecycle_event::LifecycleEvent;
pub use lifecycle_state::LifecycleState;
pub use logging_settings::LoggingSettings;
pub use port::PortManager;
pub use process::BackendProcess;
pub use readiness_settings::ReadinessSettings;
pub use resilience_settings::ResilienceSettings;
pub use supervisor::{BackendSupervisor, ProcessSupervisor};
pub use terminate::{ProcessTreeTerminator, platform_terminator};
pub use window_settings::WindowSettings;
