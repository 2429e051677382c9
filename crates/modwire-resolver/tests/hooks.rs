use std::cmp::Ordering;

use modwire_core::catalog::InMemoryCatalog;
use modwire_core::config::ResolverConfig;
use modwire_core::environment::Environment;
use modwire_core::module::{Module, ModuleId, ModuleState};
use modwire_core::outcome::ResolverErrorKind;
use modwire_core::requirement::{HostRequirement, Requirement};
use modwire_core::version::Version;
use modwire_resolver::hooks::{CandidateView, ResolverHook, SelectionPolicy};
use modwire_resolver::resolver::Resolver;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn resolver(modules: Vec<Module>) -> Resolver {
    let mut catalog = InMemoryCatalog::new();
    for m in modules {
        catalog.add(m);
    }
    Resolver::with_catalog(ResolverConfig::default(), catalog)
}

fn exporters() -> Vec<Module> {
    vec![
        Module::new(1, "new", v("2.0")).exports("p"),
        Module::new(2, "old", v("1.0")).exports("p"),
        Module::new(3, "app", v("1.0")).imports("p"),
    ]
}

struct HideModule(ModuleId);

impl ResolverHook for HideModule {
    fn filter_matches(
        &self,
        _requirer: &Module,
        _requirement: &Requirement,
        candidates: &mut Vec<CandidateView<'_>>,
    ) {
        candidates.retain(|c| c.module != self.0);
    }
}

struct HideHost(ModuleId);

impl ResolverHook for HideHost {
    fn filter_host_matches(
        &self,
        _fragment: &Module,
        _host: &HostRequirement,
        candidates: &mut Vec<CandidateView<'_>>,
    ) {
        candidates.retain(|c| c.module != self.0);
    }
}

struct Veto(ModuleId);

impl ResolverHook for Veto {
    fn filter_resolvable(&self, candidates: &mut Vec<ModuleId>) {
        candidates.retain(|id| *id != self.0);
    }
}

struct NoCollisions;

impl ResolverHook for NoCollisions {
    fn filter_singleton_collisions(&self, _singleton: &Module, collisions: &mut Vec<ModuleId>) {
        collisions.clear();
    }
}

struct LowestVersion;

impl SelectionPolicy for LowestVersion {
    fn compare(&self, a: &CandidateView<'_>, b: &CandidateView<'_>) -> Ordering {
        a.version.cmp(b.version)
    }
}

#[test]
fn hook_can_hide_candidates() {
    let mut r = resolver(exporters());
    r.set_hook(HideModule(ModuleId(1)));
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
}

#[test]
fn hook_can_hide_fragment_hosts() {
    let modules = || {
        vec![
            Module::new(1, "host", v("1.0")),
            Module::new(2, "host", v("2.0")),
            Module::new(3, "frag", v("1.0")).fragment_of(HostRequirement::new("host")),
        ]
    };

    let mut open = resolver(modules());
    let outcome = open.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.get(ModuleId(3)).unwrap().hosts.len(), 2);

    let mut r = resolver(modules());
    r.set_hook(HideHost(ModuleId(1)));
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    let frag = outcome.get(ModuleId(3)).unwrap();
    assert_eq!(frag.state, ModuleState::Resolved);
    assert_eq!(frag.hosts, vec![ModuleId(2)]);
}

#[test]
fn hook_hiding_every_host_leaves_the_fragment_unattached() {
    let mut r = resolver(vec![
        Module::new(1, "host", v("1.0")),
        Module::new(2, "frag", v("1.0")).fragment_of(HostRequirement::new("host")),
    ]);
    r.set_hook(HideHost(ModuleId(1)));
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert!(outcome
        .get(ModuleId(2))
        .unwrap()
        .has_error(ResolverErrorKind::MissingFragmentHost));
}

#[test]
fn hook_can_veto_resolution() {
    let mut r = resolver(exporters());
    r.set_hook(Veto(ModuleId(1)));
    let outcome = r.resolve(None, &Environment::default()).unwrap();

    let vetoed = outcome.get(ModuleId(1)).unwrap();
    assert_eq!(vetoed.state, ModuleState::Unresolved);
    assert!(vetoed.has_error(ResolverErrorKind::DisabledModule));
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
}

#[test]
fn hook_can_allow_singleton_coexistence() {
    let mut r = resolver(vec![
        Module::new(1, "x", v("1.0")).singleton(),
        Module::new(2, "x", v("2.0")).singleton(),
    ]);
    r.set_hook(NoCollisions);
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.resolved().count(), 2);
}

#[test]
fn selection_policy_overrides_version_preference() {
    let mut r = resolver(exporters());
    r.set_selection_policy(LowestVersion);
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
}

#[test]
fn closures_work_as_selection_policies() {
    fn prefer_new(a: &CandidateView<'_>, b: &CandidateView<'_>) -> Ordering {
        let rank = |c: &CandidateView<'_>| if c.module_name == "old" { 1 } else { 0 };
        rank(a).cmp(&rank(b))
    }
    let mut r = resolver(exporters());
    r.set_selection_policy(prefer_new);
    let outcome = r.resolve(None, &Environment::default()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(1)));
}
