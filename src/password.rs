//! Password provider contract (consumed, optional) — a zero-argument
//! function returning a password, with the provided implementations spec §6
//! names: static literal, environment variable, interactive prompt, a
//! custom callback, and a fallback chain.

use std::io::Write;

use thiserror::Error;

pub const PASSWORD_ENV_VAR: &str = "NOISEFS_PASSWORD";

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("required environment variable {0} is not set")]
    EnvVarMissing(String),
    #[error("password confirmation did not match")]
    ConfirmationMismatch,
    #[error("failed to read password: {0}")]
    Io(String),
    #[error("{0}")]
    Custom(String),
}

pub trait PasswordProvider: Send + Sync {
    fn provide(&self) -> Result<String, PasswordError>;
}

/// Test-only literal password (spec §6: "static literal (test only)").
pub struct StaticPasswordProvider(pub String);

impl PasswordProvider for StaticPasswordProvider {
    fn provide(&self) -> Result<String, PasswordError> {
        Ok(self.0.clone())
    }
}

/// Reads `var_name` from the process environment. `required = true` errors
/// when unset; `required = false` resolves to an empty string, letting the
/// fallback chain move on to the next provider.
pub struct EnvVarPasswordProvider {
    pub var_name: String,
    pub required: bool,
}

impl EnvVarPasswordProvider {
    pub fn new(var_name: impl Into<String>, required: bool) -> Self {
        Self { var_name: var_name.into(), required }
    }
}

impl PasswordProvider for EnvVarPasswordProvider {
    fn provide(&self) -> Result<String, PasswordError> {
        match std::env::var(&self.var_name) {
            Ok(value) => Ok(value),
            Err(_) if self.required => Err(PasswordError::EnvVarMissing(self.var_name.clone())),
            Err(_) => Ok(String::new()),
        }
    }
}

/// Prompts on stdin/stdout. `confirm` re-prompts and requires the two
/// entries to match, mirroring an interactive `passwd`-style flow.
pub struct InteractivePasswordProvider {
    pub prompt: String,
    pub confirm: bool,
}

impl InteractivePasswordProvider {
    pub fn new(prompt: impl Into<String>, confirm: bool) -> Self {
        Self { prompt: prompt.into(), confirm }
    }

    fn read_line(&self, label: &str) -> Result<String, PasswordError> {
        print!("{label}: ");
        std::io::stdout().flush().map_err(|e| PasswordError::Io(e.to_string()))?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map_err(|e| PasswordError::Io(e.to_string()))?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

impl PasswordProvider for InteractivePasswordProvider {
    fn provide(&self) -> Result<String, PasswordError> {
        let first = self.read_line(&self.prompt)?;
        if self.confirm {
            let second = self.read_line("confirm password")?;
            if first != second {
                return Err(PasswordError::ConfirmationMismatch);
            }
        }
        Ok(first)
    }
}

/// Wraps an arbitrary closure, for embedders with their own secret store.
pub struct CallbackPasswordProvider<F>(pub F)
where
    F: Fn() -> Result<String, PasswordError> + Send + Sync;

impl<F> PasswordProvider for CallbackPasswordProvider<F>
where
    F: Fn() -> Result<String, PasswordError> + Send + Sync,
{
    fn provide(&self) -> Result<String, PasswordError> {
        (self.0)()
    }
}

/// Tries providers in order until one returns a non-empty password (spec
/// §6). A provider erroring is treated the same as returning empty: the
/// chain moves on, only failing once every provider has been exhausted.
pub struct FallbackPasswordProviderChain {
    providers: Vec<Box<dyn PasswordProvider>>,
}

impl FallbackPasswordProviderChain {
    pub fn new(providers: Vec<Box<dyn PasswordProvider>>) -> Self {
        Self { providers }
    }
}

impl PasswordProvider for FallbackPasswordProviderChain {
    fn provide(&self) -> Result<String, PasswordError> {
        for provider in &self.providers {
            if let Ok(password) = provider.provide() {
                if !password.is_empty() {
                    return Ok(password);
                }
            }
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_its_literal() {
        let provider = StaticPasswordProvider("hunter2".into());
        assert_eq!(provider.provide().unwrap(), "hunter2");
    }

    #[test]
    fn optional_env_var_resolves_empty_when_unset() {
        let provider = EnvVarPasswordProvider::new("NOISEFS_TEST_UNSET_VAR_XYZ", false);
        assert_eq!(provider.provide().unwrap(), "");
    }

    #[test]
    fn required_env_var_errors_when_unset() {
        let provider = EnvVarPasswordProvider::new("NOISEFS_TEST_UNSET_VAR_XYZ", true);
        assert!(matches!(provider.provide(), Err(PasswordError::EnvVarMissing(_))));
    }

    #[test]
    fn fallback_chain_skips_empty_providers() {
        let chain = FallbackPasswordProviderChain::new(vec![
            Box::new(EnvVarPasswordProvider::new("NOISEFS_TEST_UNSET_VAR_XYZ", false)),
            Box::new(StaticPasswordProvider("fallback-password".into())),
        ]);
        assert_eq!(chain.provide().unwrap(), "fallback-password");
    }

    #[test]
    fn fallback_chain_with_all_empty_providers_resolves_empty() {
        let chain = FallbackPasswordProviderChain::new(vec![Box::new(StaticPasswordProvider(String::new()))]);
        assert_eq!(chain.provide().unwrap(), "");
    }
}
