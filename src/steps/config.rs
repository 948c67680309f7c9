use super::reconcile_into;
use crate::engine::{Session, Step, StepReport};
use crate::paths;
use crate::schema::ConfigLineEntry;
use anyhow::Result;
use declarative::{ConfigLine, ConfigLineProvider, ReconcileSummary};

/// Appends declared lines to existing config files
pub struct ConfigStep {
    lines: Vec<ConfigLine>,
}

impl ConfigStep {
    pub fn new(entries: &[ConfigLineEntry]) -> Self {
        Self {
            lines: entries
                .iter()
                .map(|e| ConfigLine::new(paths::expand(&e.file), &e.marker, &e.line))
                .collect(),
        }
    }
}

impl Step for ConfigStep {
    fn name(&self) -> &'static str {
        "config"
    }

    fn description(&self) -> &'static str {
        "Ensure lines are present in shell and tool config files"
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if self.lines.is_empty() {
            return Ok(StepReport::noted("nothing declared"));
        }

        let mut summary = ReconcileSummary::default();
        reconcile_into(
            self.name(),
            &ConfigLineProvider,
            &self.lines,
            session,
            &mut summary,
        );
        Ok(StepReport::from_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunOptions;
    use crate::engine::gate::tests::TableProbe;
    use crate::engine::session::tests::{SharedBackend, fake_host, fake_privilege};
    use crate::system::tests::FakeSystem;
    use std::fs;

    #[test]
    fn test_patches_existing_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let zshrc = dir.path().join(".zshrc");
        fs::write(&zshrc, "export PATH=$HOME/bin:$PATH").unwrap();

        let entries = vec![
            ConfigLineEntry {
                file: zshrc.to_string_lossy().into_owned(),
                marker: "starship init".into(),
                line: r#"eval "$(starship init zsh)""#.into(),
            },
            ConfigLineEntry {
                file: dir.path().join(".bashrc").to_string_lossy().into_owned(),
                marker: "starship init".into(),
                line: r#"eval "$(starship init bash)""#.into(),
            },
        ];
        let step = ConfigStep::new(&entries);

        let host = fake_host(
            FakeSystem::default(),
            TableProbe::default(),
            SharedBackend::default(),
        );
        let (_auth, privilege) = fake_privilege();
        let mut session = Session::new(&host, privilege, RunOptions::default());

        let report = step.run(&mut session).unwrap();
        assert_eq!((report.summary.installed, report.summary.skipped), (1, 1));

        let once = fs::read_to_string(&zshrc).unwrap();
        assert_eq!(
            once,
            "export PATH=$HOME/bin:$PATH\neval \"$(starship init zsh)\"\n"
        );

        step.run(&mut session).unwrap();
        assert_eq!(fs::read_to_string(&zshrc).unwrap(), once);
        assert!(!dir.path().join(".bashrc").exists());
    }
}
