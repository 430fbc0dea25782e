mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    DemoSettings, LoggingSettings, PollerSettings, ServerSettings, SessionSettings, Settings,
};

/// Prefix of every environment override, e.g. `QUEUESCOPE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "QUEUESCOPE";

/// Loads the configuration from `config/default` and `QUEUESCOPE_*` environment
/// variables, then fills whatever is missing from `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("demo.queues")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
