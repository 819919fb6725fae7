use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// A variable that is set to an empty (or all-whitespace) string counts as
/// missing; API keys exported as `KEY=` are a common misconfiguration.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_env_var_opt(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Like [`get_env_var`], but for optional settings.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VAR: &str = "SHARED_UTILS_TEST_VAR";

    #[test]
    #[serial]
    fn reads_a_set_variable() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::set_var(VAR, "value") };
        assert_eq!(get_env_var(VAR).unwrap(), "value");
        unsafe { std::env::remove_var(VAR) };
    }

    #[test]
    #[serial]
    fn unset_variable_names_itself_in_the_error() {
        unsafe { std::env::remove_var(VAR) };
        let err = get_env_var(VAR).unwrap_err();
        assert_eq!(err.0, VAR);
        assert_eq!(err.to_string(), format!("Missing environment variable: {VAR}"));
    }

    #[test]
    #[serial]
    fn empty_variable_counts_as_missing() {
        unsafe { std::env::set_var(VAR, "  ") };
        assert!(get_env_var(VAR).is_err());
        assert_eq!(get_env_var_opt(VAR), None);
        unsafe { std::env::remove_var(VAR) };
    }
}
