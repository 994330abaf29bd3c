use super::{InstallEngine, SetReport, TrackingPolicy};
use crate::environment::{Environment, Runtime};
use crate::error::{EnvkitError, Result};
use crate::executor::InstallResult;
use crate::progress::{EtaTracker, truncate_description};
use crate::retry::retry;
use crate::storage::Storage;
use std::time::Instant;
use tracing::{debug, info, warn};

impl<S: Storage> InstallEngine<'_, S> {
    /// Install every package of `set_id` into `env`.
    ///
    /// Skips without a single attempt when the manifest already lists the
    /// set. Packages run in catalog order; a failed package is retried up to
    /// the policy budget and never stops the ones after it.
    ///
    /// Returns `NotFound` when the catalog has no packages for the set.
    pub fn install_set(
        &self,
        runtime: &Runtime,
        env: &Environment,
        set_id: &str,
    ) -> Result<SetReport> {
        let name = self
            .catalog
            .package_set(set_id)
            .map(|set| set.name.clone())
            .unwrap_or_else(|| set_id.to_string());

        if self.store.is_set_installed(env, set_id) {
            info!("Set '{}' already installed in '{}'", set_id, env.name);
            self.observer.set_skipped(set_id);
            return Ok(SetReport::skipped(set_id, &name));
        }

        let packages = self.catalog.set_packages(set_id);
        if packages.is_empty() {
            warn!("Package set '{}' not found or empty", set_id);
            self.observer
                .warning(&format!("Package set '{}' not found or empty", set_id));
            return Err(EnvkitError::not_found("Package set", set_id));
        }

        let total = packages.len();
        let policy = self.options.retry;
        let max = policy.max_attempts();
        let started = Instant::now();
        let mut eta = EtaTracker::new(self.options.eta_interval);
        let mut results: Vec<InstallResult> = Vec::with_capacity(total);

        self.observer.set_started(set_id, &name, total);

        for (index, package) in packages.iter().enumerate() {
            let description = self
                .catalog
                .package_description(package)
                .map(|d| truncate_description(d, self.options.description_width));
            self.observer
                .package_started(index + 1, total, package, description.as_deref());

            let package_started = Instant::now();
            let retried = retry(
                &policy,
                |_| {
                    let result = self.executor.install_package(runtime, package);
                    if result.success { Ok(result) } else { Err(result) }
                },
                |attempt, failed: &InstallResult| {
                    let detail = failed.error.as_deref().unwrap_or("");
                    debug!("{} attempt {}/{} failed: {}", package, attempt, max, detail);
                    if attempt < max {
                        self.observer.attempt_failed(package, attempt, max, detail);
                    }
                },
            );

            let mut result = match retried.outcome {
                Ok(result) | Err(result) => result,
            };
            result.attempts = retried.attempts;
            result.elapsed = package_started.elapsed();
            if let Some(err) = result.to_error() {
                warn!("{}", err);
            }
            self.observer.package_finished(&result);

            eta.record(result.elapsed);
            let remaining = total - eta.completed();
            if eta.is_due() && remaining > 0 {
                self.observer
                    .eta(eta.completed(), remaining, eta.estimate(remaining));
            }
            results.push(result);
        }

        let mut report = SetReport {
            set_id: set_id.to_string(),
            name,
            results,
            skipped: false,
            recorded: false,
            elapsed: started.elapsed(),
        };
        self.observer.set_finished(&report);
        report.recorded = self.record_set(env, &report, &packages);
        Ok(report)
    }

    /// Write the set outcome to the manifest per the tracking policy.
    /// Returns whether the set itself was recorded.
    fn record_set(&self, env: &Environment, report: &SetReport, packages: &[String]) -> bool {
        let (tracked, record_set): (Vec<&str>, bool) = match self.options.tracking {
            TrackingPolicy::Attempted => (packages.iter().map(String::as_str).collect(), true),
            TrackingPolicy::Confirmed => (report.succeeded_packages(), report.is_clean()),
        };

        if !tracked.is_empty() {
            if let Err(e) = self.store.record_packages(env, &tracked) {
                self.persistence_warning("Could not record installed packages", &e);
            }
        }

        if !record_set {
            let failed = report.failed_packages().join(", ");
            self.observer.warning(&format!(
                "Set '{}' not marked installed; failed packages will be retried next time: {}",
                report.set_id, failed
            ));
            return false;
        }

        match self.store.record_set_install(env, &report.set_id, tracked.len()) {
            Ok(()) => true,
            Err(e) => {
                self.persistence_warning(&format!("Could not record set '{}'", report.set_id), &e);
                false
            }
        }
    }
}
