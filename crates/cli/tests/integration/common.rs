//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Get path to a file of the ownCloud demo.
pub fn demo_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("..")
    .join("..")
    .join("demos")
    .join("owncloud")
    .join(name)
}

fn read(path: PathBuf) -> String {
  std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding `playbook.yml` and
/// `inventory.yml`. Commands run from that directory with the user settings
/// directory pointed inside it.
pub struct TestEnv {
  pub temp: TempDir,
  pub manifest_path: PathBuf,
  pub inventory_path: PathBuf,
}

impl TestEnv {
  /// The ownCloud demo playbook and inventory.
  pub fn owncloud() -> Self {
    Self::with_content(&read(demo_path("playbook.yml")), &read(demo_path("inventory.yml")))
  }

  /// A manifest fixture against the shared fixture inventory.
  pub fn from_fixture(manifest: &str) -> Self {
    Self::with_content(&read(fixture_path(manifest)), &read(fixture_path("inventory.yml")))
  }

  pub fn with_content(manifest: &str, inventory: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let manifest_path = temp.path().join("playbook.yml");
    let inventory_path = temp.path().join("inventory.yml");
    std::fs::write(&manifest_path, manifest).unwrap();
    std::fs::write(&inventory_path, inventory).unwrap();
    Self {
      temp,
      manifest_path,
      inventory_path,
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Directory searched for the default settings file.
  pub fn settings_dir(&self) -> PathBuf {
    self.temp.path().join("config").join("rolebook")
  }

  /// Get a pre-configured Command for the rolebook binary.
  ///
  /// Runs from the temp directory, so the default `inventory.yml` resolves to
  /// this environment's inventory, and clears every `ROLEBOOK_*` override.
  pub fn rolebook_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("rolebook");
    cmd.current_dir(self.temp.path());
    cmd.env("HOME", self.temp.path());
    cmd.env("XDG_CONFIG_HOME", self.temp.path().join("config"));
    cmd.env("APPDATA", self.temp.path().join("config")); // For Windows
    for var in ["ROLEBOOK_INVENTORY", "ROLEBOOK_TAGS", "ROLEBOOK_SKIP_TAGS", "ROLEBOOK_LOG", "RUST_LOG"] {
      cmd.env_remove(var);
    }
    cmd
  }

  /// Run a command with `-o json` appended and parse its stdout.
  pub fn json(&self, args: &[&str]) -> serde_json::Value {
    let output = self.rolebook_cmd().args(args).args(["-o", "json"]).output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
      panic!(
        "invalid JSON ({}): {}\nstderr: {}",
        e,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
      )
    })
  }
}

/// Roles of a host's steps in a JSON plan.
pub fn step_roles(plan: &serde_json::Value, host: &str) -> Vec<String> {
  plan["hosts"][host]["steps"]
    .as_array()
    .unwrap_or_else(|| panic!("no steps for {}", host))
    .iter()
    .map(|step| step["role"].as_str().unwrap().to_string())
    .collect()
}
