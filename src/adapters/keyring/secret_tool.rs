use age::secrecy::{ExposeSecret, SecretString};

use crate::adapters::exec;
use crate::core::errors::{AppBackupError, Result};
use crate::core::traits::keyring::Keyring;

/// libsecret keyring accessed through the `secret-tool` CLI.
pub struct SecretToolKeyring {
    tool_path: String,
}

impl SecretToolKeyring {
    pub fn new() -> Self {
        Self {
            tool_path: "secret-tool".to_string(),
        }
    }

    fn attribute_args<'a>(schema: &'a str, attributes: &[(&'a str, &'a str)]) -> Vec<&'a str> {
        let mut args = vec!["xdg:schema", schema];
        for (key, value) in attributes {
            args.push(key);
            args.push(value);
        }
        args
    }

    fn failure(&self, reason: String) -> AppBackupError {
        AppBackupError::KeyImportFailed {
            app: self.tool_path.clone(),
            reason,
        }
    }
}

impl Default for SecretToolKeyring {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyring for SecretToolKeyring {
    fn search(&self, schema: &str, attributes: &[(&str, &str)]) -> Result<Option<SecretString>> {
        let mut args = vec!["lookup"];
        args.extend(Self::attribute_args(schema, attributes));

        let output = exec::run(&self.tool_path, &args, None, None)
            .map_err(|e| self.failure(format!("Failed to run {}: {e}", self.tool_path)))?;

        // `lookup` exits 1 with empty output when nothing matches.
        if !output.status.success() {
            let stderr = exec::stderr_of(&output);
            if stderr.is_empty() {
                return Ok(None);
            }
            return Err(self.failure(stderr));
        }

        let value = String::from_utf8_lossy(&output.stdout)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(SecretString::from(value)))
    }

    fn store(
        &self,
        schema: &str,
        label: &str,
        attributes: &[(&str, &str)],
        value: &SecretString,
    ) -> Result<()> {
        let label_arg = format!("--label={label}");
        let mut args = vec!["store", label_arg.as_str()];
        args.extend(Self::attribute_args(schema, attributes));

        let output = exec::run(
            &self.tool_path,
            &args,
            None,
            Some(value.expose_secret().as_bytes()),
        )
        .map_err(|e| self.failure(format!("Failed to run {}: {e}", self.tool_path)))?;

        if !output.status.success() {
            return Err(self.failure(exec::stderr_of(&output)));
        }
        Ok(())
    }
}
