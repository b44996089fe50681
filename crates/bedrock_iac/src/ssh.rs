//! GitOps deploy key generation.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use bedrock_runner::{CommandRunner, CommandSpec};

use crate::error::{IacError, IacResult};

pub const SSH_KEYGEN: &str = "ssh-keygen";

/// Produces an SSH key pair and returns the public half.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, dir: &Path, name: &str) -> IacResult<String>;
}

/// `KeyGenerator` using the local `ssh-keygen`.
pub struct SshKeygen {
    runner: Arc<dyn CommandRunner>,
    bits: u32,
}

impl SshKeygen {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner, bits: 4096 }
    }

    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }
}

impl KeyGenerator for SshKeygen {
    fn generate(&self, dir: &Path, name: &str) -> IacResult<String> {
        let private_key = dir.join(name);
        let public_key = dir.join(format!("{}.pub", name));
        info!("Generating SSH key {:?}", private_key);

        let spec = CommandSpec::new(SSH_KEYGEN)
            .args(["-t", "rsa", "-b"])
            .arg(self.bits.to_string())
            .arg("-f")
            .arg(private_key.display().to_string())
            .args(["-N", "", "-q"]);

        let result = self.runner.run(&spec)?;
        if !result.success() {
            return Err(IacError::KeyGeneration(format!(
                "exit code {}: {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }

        let contents = std::fs::read_to_string(&public_key).map_err(|e| {
            IacError::KeyGeneration(format!("cannot read {}: {}", public_key.display(), e))
        })?;
        let key = contents.trim().to_string();
        if key.is_empty() {
            return Err(IacError::KeyGeneration(format!(
                "{} is empty",
                public_key.display()
            )));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_runner::{MockResponse, MockRunner};
    use tempfile::TempDir;

    #[test]
    fn test_generate_reads_public_key() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("deploy-key.pub"), "ssh-rsa AAAAB3Nza demo\n").unwrap();

        let mock = MockRunner::new();
        let keygen = SshKeygen::new(Arc::new(mock.clone()));
        let key = keygen.generate(dir.path(), "deploy-key").unwrap();

        assert_eq!(key, "ssh-rsa AAAAB3Nza demo");
        let call = &mock.get_calls()[0];
        assert_eq!(call.program, "ssh-keygen");
        assert!(call.args.contains(&"4096".to_string()));
        assert!(call
            .args
            .contains(&dir.path().join("deploy-key").display().to_string()));
    }

    #[test]
    fn test_generate_fails_on_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let mock = MockRunner::new().add_response(SSH_KEYGEN, MockResponse::failure(1, "bad"));
        let keygen = SshKeygen::new(Arc::new(mock));
        assert!(matches!(
            keygen.generate(dir.path(), "deploy-key"),
            Err(IacError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_generate_fails_without_public_key() {
        let dir = TempDir::new().unwrap();
        let keygen = SshKeygen::new(Arc::new(MockRunner::new())).with_bits(2048);
        assert!(keygen.generate(dir.path(), "deploy-key").is_err());
    }
}
