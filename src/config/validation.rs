//! Configuration validation logic

use crate::config::{Config, EndpointConfig};
use crate::error::{Error, Result};

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::invalid_config(
                "server.port",
                "port must be in range 1-65535",
            ));
        }

        if self.server.host.is_empty() {
            return Err(Error::invalid_config("server.host", "host cannot be empty"));
        }

        if self.server.static_dir.is_empty() {
            return Err(Error::invalid_config(
                "server.static_dir",
                "static directory cannot be empty",
            ));
        }

        for (path, endpoint) in &self.endpoints {
            if path.is_empty() {
                return Err(Error::invalid_config(
                    "endpoints",
                    "endpoint path cannot be empty",
                ));
            }
            endpoint.validate(path)?;
        }

        Ok(())
    }
}

impl EndpointConfig {
    /// Validate a single endpoint against its variant rules
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            EndpointConfig::Error { status_code, .. } => {
                validate_error_status(path, *status_code)
            },
            EndpointConfig::Delay { .. } => Ok(()),
            EndpointConfig::ConditionalError {
                error_every_n,
                status_code,
                ..
            } => {
                if *error_every_n == 0 {
                    return Err(Error::invalid_config(
                        format!("endpoints.{}.error_every_n", path),
                        "error_every_n must be at least 1",
                    ));
                }
                validate_error_status(path, *status_code)
            },
        }
    }
}

fn validate_error_status(path: &str, status_code: u16) -> Result<()> {
    if !(400..=599).contains(&status_code) {
        return Err(Error::invalid_config(
            format!("endpoints.{}.status_code", path),
            format!("status code {} is outside the error range 400-599", status_code),
        ));
    }
    Ok(())
}
