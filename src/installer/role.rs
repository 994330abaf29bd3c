use super::{InstallEngine, RoleReport, TrackingPolicy};
use crate::environment::{Environment, Runtime};
use crate::error::{EnvkitError, Result};
use crate::storage::Storage;
use std::time::Instant;
use tracing::{info, warn};

impl<S: Storage> InstallEngine<'_, S> {
    /// Install every set of `role_id`, in the role's declared order.
    ///
    /// A role with no sets is `NotFound` and nothing runs. Otherwise every
    /// set is attempted even when earlier ones fail or are missing from the
    /// catalog.
    pub fn install_role(
        &self,
        runtime: &Runtime,
        env: &Environment,
        role_id: &str,
    ) -> Result<RoleReport> {
        let set_ids = self.catalog.role_sets(role_id);
        let role = match self.catalog.job_role(role_id) {
            Some(role) if !set_ids.is_empty() => role,
            _ => {
                warn!("Job role '{}' not found", role_id);
                return Err(EnvkitError::not_found("Job role", role_id));
            }
        };

        let total_packages = self.catalog.union_packages(&set_ids[..]).len();
        info!(
            "Installing role '{}' ({} sets, {} packages) into '{}'",
            role_id,
            set_ids.len(),
            total_packages,
            env.name
        );
        self.observer.role_started(role, total_packages);

        let started = Instant::now();
        let mut sets = Vec::with_capacity(set_ids.len());
        let mut unavailable_sets = Vec::new();

        for set_id in &set_ids {
            match self.install_set(runtime, env, set_id) {
                Ok(report) => sets.push(report),
                Err(e) => {
                    warn!("Skipping set '{}' of role '{}': {}", set_id, role_id, e);
                    unavailable_sets.push(set_id.clone());
                }
            }
        }

        let mut report = RoleReport {
            role_id: role_id.to_string(),
            name: role.name.clone(),
            sets,
            unavailable_sets,
            total_packages,
            recorded: false,
            elapsed: started.elapsed(),
        };

        let record = match self.options.tracking {
            TrackingPolicy::Attempted => true,
            TrackingPolicy::Confirmed => report.is_clean(),
        };
        if record {
            match self.store.record_role_install(env, role_id, total_packages) {
                Ok(()) => report.recorded = true,
                Err(e) => {
                    self.persistence_warning(&format!("Could not record role '{}'", role_id), &e)
                }
            }
        } else {
            self.observer.warning(&format!(
                "Role '{}' not marked installed until all of its sets install cleanly",
                role_id
            ));
        }

        self.observer.role_finished(&report);
        Ok(report)
    }
}
