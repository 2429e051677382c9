use modwire_core::environment::Environment;
use modwire_core::module::{ModuleId, ModuleState};
use modwire_core::outcome::{ResolverError, ResolverErrorKind};

use crate::module::ModIdx;
use crate::session::Session;

impl Session<'_> {
    /// Static checks run before any constraint is resolved. Ineligible
    /// modules are marked unresolvable with the reason recorded.
    pub(crate) fn check_eligibility(&mut self, environment: &Environment) {
        let mut allowed: Vec<ModuleId> = self
            .modules
            .iter()
            .filter(|m| m.state == ModuleState::Unresolved && !m.pending_removal)
            .map(|m| m.module.id)
            .collect();
        if let Some(hook) = self.hook {
            hook.filter_resolvable(&mut allowed);
        }

        for idx in 0..self.modules.len() {
            let m = &self.modules[idx];
            if m.state != ModuleState::Unresolved || m.pending_removal {
                continue;
            }
            if let Some(error) = self.ineligibility(idx, environment, &allowed) {
                tracing::debug!(module = %m.module, "{error}");
                let m = &mut self.modules[idx];
                m.resolvable = false;
                m.record(error);
            }
        }
    }

    fn ineligibility(
        &self,
        idx: ModIdx,
        environment: &Environment,
        allowed: &[ModuleId],
    ) -> Option<ResolverError> {
        let module = &self.modules[idx].module;
        let error = |kind, detail: String| Some(ResolverError::new(kind, module.id, detail));

        if let Some(reason) = &module.disabled {
            return error(ResolverErrorKind::DisabledModule, reason.clone());
        }
        if !allowed.contains(&module.id) {
            return error(
                ResolverErrorKind::DisabledModule,
                "excluded by the resolver hook".to_string(),
            );
        }
        let Some(platform) = environment.select(module.platform_filter.as_ref()) else {
            let filter = module
                .platform_filter
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            return error(
                ResolverErrorKind::PlatformFilterMismatch,
                format!("no environment matches {filter}"),
            );
        };
        if !platform.provides_any(&module.required_execution_environments) {
            return error(
                ResolverErrorKind::MissingExecutionEnvironment,
                format!(
                    "requires one of {}",
                    module.required_execution_environments.join(", ")
                ),
            );
        }
        let native_match = module.native_code.iter().any(|clause| {
            clause
                .filter
                .as_ref()
                .map_or(true, |f| f.matches(&platform.properties))
        });
        if !module.native_code.is_empty() && !native_match && !module.native_code_optional {
            return error(
                ResolverErrorKind::InvalidNativeCode,
                "no native code clause matches the environment".to_string(),
            );
        }
        None
    }
}
