mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, LogFormat, LoggingConfig, MetricsConfig, RateLimitConfig,
    SchedulerConfig, SecurityConfig, ServerConfig, TokenConfig,
};
