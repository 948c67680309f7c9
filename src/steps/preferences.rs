use super::reconcile_into;
use crate::engine::{Session, Step, StepReport};
use crate::schema::{PreferenceValue, PrivilegeConfig};
use crate::system::{Preference, PreferenceProvider};
use anyhow::{Context, Result};
use declarative::{ReconcileSummary, SudoProvider};
use std::collections::BTreeMap;

/// Writes macOS defaults whose current value differs
pub struct PreferencesStep {
    preferences: Vec<Preference>,
}

impl PreferencesStep {
    pub fn new(
        defaults: &BTreeMap<String, PreferenceValue>,
        privilege: &PrivilegeConfig,
    ) -> Result<Self> {
        let preferences = defaults
            .iter()
            .map(|(domain_key, value)| {
                Preference::from_domain_key(domain_key, value.clone())
                    .map(|p| p.with_sudo(privilege.default_requires_sudo(domain_key)))
                    .with_context(|| format!("Invalid default key: {domain_key}"))
            })
            .collect::<Result<_>>()?;
        Ok(Self { preferences })
    }
}

impl Step for PreferencesStep {
    fn name(&self) -> &'static str {
        "preferences"
    }

    fn description(&self) -> &'static str {
        "Apply macOS defaults"
    }

    fn needs_privilege(&self) -> bool {
        self.preferences.iter().any(|p| p.requires_sudo)
    }

    fn run(&self, session: &mut Session<'_>) -> Result<StepReport> {
        if self.preferences.is_empty() {
            return Ok(StepReport::noted("nothing declared"));
        }

        let host = session.host;
        let privilege = session.privilege.clone();
        let sudo = privilege
            .is_held()
            .then_some(&privilege as &dyn SudoProvider);
        let provider = PreferenceProvider::new(host.system.as_ref(), sudo);

        let mut summary = ReconcileSummary::default();
        reconcile_into(
            self.name(),
            &provider,
            &self.preferences,
            session,
            &mut summary,
        );

        let mut report = StepReport::from_summary(summary);
        if report.summary.installed > 0 {
            report.note = Some("some changes apply after logging out".into());
        }
        Ok(report)
    }
}
