use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a temporary project directory
pub struct TempProject {
    pub dir: TempDir,
}

impl TempProject {
    /// Create a new temporary project
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Self { dir }
    }

    /// Get the path to the project directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a file in the project with the given content
    pub fn create_file(&self, relative_path: &str, content: &str) {
        let file_path = self.dir.path().join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Create a directory in the project
    pub fn create_dir(&self, relative_path: &str) {
        fs::create_dir_all(self.dir.path().join(relative_path))
            .expect("Failed to create directory");
    }

    /// Get the absolute path to a file in the project
    pub fn file_path(&self, relative_path: &str) -> PathBuf {
        self.dir.path().join(relative_path)
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

/// pyproject.toml declaring one venv with three requirement files
pub fn sample_pyproject() -> &'static str {
    r#"[project]
name = "test-project"
version = "0.1.0"

[[tool.venvs]]
venv_base_path = ".venv"
reqs = [
    "requirements/prod",
    "requirements/dev",
    "requirements/pip",
]
"#
}

pub fn sample_prod_in() -> &'static str {
    r#"# production dependencies
attrs>=23.0
urllib3<3
colorama>=0.4.6; platform_system=="Windows"
"#
}

pub fn sample_dev_in() -> &'static str {
    r#"-r prod.in
black
isort
"#
}

pub fn sample_pip_in() -> &'static str {
    r#"-c pins.in
pip
setuptools
"#
}

pub fn sample_pins_in() -> &'static str {
    r#"pip<26
"#
}

/// Create a TempProject with the standard venv layout and .in sources
pub fn create_project_with_sources() -> TempProject {
    let project = TempProject::new();
    project.create_dir(".venv");
    project.create_file("pyproject.toml", sample_pyproject());
    project.create_file("requirements/prod.in", sample_prod_in());
    project.create_file("requirements/dev.in", sample_dev_in());
    project.create_file("requirements/pip.in", sample_pip_in());
    project.create_file("requirements/pins.in", sample_pins_in());
    project
}

/// Same layout plus lock/unlock outputs with a pip version discrepancy
pub fn create_project_with_discrepancy() -> TempProject {
    let project = create_project_with_sources();
    project.create_file(
        "requirements/prod.lock",
        "attrs==23.2.0\ncolorama==0.4.6; platform_system==\"Windows\"\npip==25.0\nurllib3==2.2.1\n",
    );
    project.create_file(
        "requirements/dev.lock",
        "attrs==23.2.0\nblack==24.4.2\nisort==5.13.2\npip==24.8\n",
    );
    project.create_file(
        "requirements/pip.lock",
        "pip==24.8\nsetuptools==69.5.1\n",
    );
    project.create_file("requirements/prod.unlock", "attrs>=23.0\npip\nurllib3<3\n");
    project.create_file("requirements/dev.unlock", "attrs>=23.0\nblack\nisort\npip\n");
    project.create_file("requirements/pip.unlock", "pip\nsetuptools\n");
    project
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_project_creation() {
        let project = TempProject::new();
        assert!(project.path().exists());
        assert!(project.path().is_dir());
    }

    #[test]
    fn test_create_file_with_subdirs() {
        let project = TempProject::new();
        project.create_file("requirements/test.in", "pip\n");

        assert!(project.file_path("requirements/test.in").exists());
    }

    #[test]
    fn test_sample_fixtures_are_nonempty() {
        assert!(!sample_pyproject().is_empty());
        assert!(!sample_prod_in().is_empty());
        assert!(!sample_pip_in().is_empty());
    }
}
