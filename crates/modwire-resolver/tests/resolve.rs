use modwire_core::capability::{GenericCapability, PackageExport};
use modwire_core::catalog::{Catalog, InMemoryCatalog};
use modwire_core::config::ResolverConfig;
use modwire_core::environment::{Environment, PlatformProperties};
use modwire_core::filter::Filter;
use modwire_core::module::{Module, ModuleId, ModuleState, NativeCodeClause};
use modwire_core::outcome::ResolverErrorKind;
use modwire_core::requirement::{GenericRequire, ModuleRequire, Namespace, PackageImport};
use modwire_core::version::{Version, VersionRange};
use modwire_resolver::resolver::Resolver;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn range(s: &str) -> VersionRange {
    VersionRange::parse(s).unwrap()
}

fn resolver(modules: Vec<Module>) -> Resolver {
    let mut catalog = InMemoryCatalog::new();
    for m in modules {
        catalog.add(m);
    }
    Resolver::with_catalog(ResolverConfig::default(), catalog)
}

fn add(resolver: &mut Resolver, module: Module) {
    resolver.catalog_mut().unwrap().add(module);
}

fn env() -> Environment {
    Environment::default()
}

/// Two exporters of q where the higher version is not the one the uses
/// constraint of p allows.
fn split_package_catalog(q_import: PackageImport) -> Vec<Module> {
    vec![
        Module::new(1, "lib-one", v("2.0")).exports("q"),
        Module::new(2, "lib-two", v("1.0"))
            .provides(PackageExport::new("q", v("1.0")))
            .provides(PackageExport::new("p", v("1.0")).uses(["q"])),
        Module::new(3, "app", v("1.0"))
            .imports("p")
            .requires(q_import),
    ]
}

#[test]
fn resolved_exporter_wins_over_lower_id() {
    let mut r = resolver(vec![Module::new(5, "b", v("1.0")).exports("p")]);
    let first = r.resolve(None, &env()).unwrap();
    assert_eq!(first.state(ModuleId(5)), Some(ModuleState::Resolved));

    add(&mut r, Module::new(1, "c", v("1.0")).exports("p"));
    add(&mut r, Module::new(2, "a", v("1.0")).imports("p"));
    let outcome = r.resolve(None, &env()).unwrap();

    assert_eq!(outcome.package_provider(ModuleId(2), "p"), Some(ModuleId(5)));
    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
}

#[test]
fn without_resolved_exporters_lower_id_wins_a_tie() {
    let mut r = resolver(vec![
        Module::new(5, "b", v("1.0")).exports("p"),
        Module::new(1, "c", v("1.0")).exports("p"),
        Module::new(2, "a", v("1.0")).imports("p"),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(2), "p"), Some(ModuleId(1)));
}

#[test]
fn higher_export_version_is_preferred() {
    let mut r = resolver(vec![
        Module::new(1, "old", v("1.0")).exports("p"),
        Module::new(2, "new", v("1.5")).exports("p"),
        Module::new(3, "app", v("1.0")).imports("p"),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
}

#[test]
fn import_cycle_resolves_both_modules() {
    let mut r = resolver(vec![
        Module::new(1, "a", v("1.0"))
            .provides(PackageExport::new("p", v("1.0")).uses(["q"]))
            .imports("q"),
        Module::new(2, "b", v("1.0"))
            .provides(PackageExport::new("q", v("1.0")).uses(["r"]))
            .imports("p"),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert_eq!(outcome.state(ModuleId(2)), Some(ModuleState::Resolved));
    assert_eq!(outcome.package_provider(ModuleId(1), "q"), Some(ModuleId(2)));
    assert_eq!(outcome.package_provider(ModuleId(2), "p"), Some(ModuleId(1)));
}

#[test]
fn failure_inside_a_cycle_fails_every_member() {
    let mut r = resolver(vec![
        Module::new(1, "a", v("1.0")).requires(ModuleRequire::new("b")),
        Module::new(2, "b", v("1.0"))
            .requires(ModuleRequire::new("a"))
            .requires(ModuleRequire::new("c")),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    for id in [1, 2] {
        let m = outcome.get(ModuleId(id)).unwrap();
        assert!(!m.is_resolved());
        assert!(m.has_error(ResolverErrorKind::MissingRequiredModule));
    }
}

#[test]
fn singleton_keeps_highest_version() {
    let mut r = resolver(vec![
        Module::new(1, "x", v("1.0")).singleton(),
        Module::new(2, "x", v("2.0")).singleton(),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    assert_eq!(outcome.state(ModuleId(2)), Some(ModuleState::Resolved));
    let loser = outcome.get(ModuleId(1)).unwrap();
    assert_eq!(loser.state, ModuleState::Unresolved);
    assert_eq!(loser.errors[0].kind, ResolverErrorKind::SingletonCollision);
    assert_eq!(loser.errors[0].related, Some(ModuleId(2)));
}

#[test]
fn resolved_singleton_blocks_newer_version() {
    let mut r = resolver(vec![Module::new(1, "x", v("1.0")).singleton()]);
    r.resolve(None, &env()).unwrap();

    add(&mut r, Module::new(2, "x", v("2.0")).singleton());
    let outcome = r.resolve(None, &env()).unwrap();
    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert!(outcome
        .get(ModuleId(2))
        .unwrap()
        .has_error(ResolverErrorKind::SingletonCollision));
}

#[test]
fn missing_requirements_report_their_kind() {
    let mut r = resolver(vec![
        Module::new(1, "a", v("1.0")).imports("missing.pkg"),
        Module::new(2, "b", v("1.0")).requires(ModuleRequire::new("missing")),
        Module::new(3, "c", v("1.0")).requires(GenericRequire::new("acme.service")),
        Module::new(4, "d", v("1.0"))
            .requires(PackageImport::new("missing.pkg").optional())
            .requires(ModuleRequire::new("missing").optional()),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    assert!(outcome
        .get(ModuleId(1))
        .unwrap()
        .has_error(ResolverErrorKind::MissingImportedPackage));
    assert!(outcome
        .get(ModuleId(2))
        .unwrap()
        .has_error(ResolverErrorKind::MissingRequiredModule));
    assert!(outcome
        .get(ModuleId(3))
        .unwrap()
        .has_error(ResolverErrorKind::MissingRequiredCapability));
    let d = outcome.get(ModuleId(4)).unwrap();
    assert!(d.is_resolved());
    assert!(d.wiring.wires.is_empty());
}

#[test]
fn failure_propagates_to_dependents() {
    let mut r = resolver(vec![
        Module::new(1, "base", v("1.0")).exports("p").imports("gone"),
        Module::new(2, "mid", v("1.0")).exports("q").imports("p"),
        Module::new(3, "top", v("1.0")).imports("q"),
        Module::new(4, "other", v("1.0")),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    for id in [1, 2, 3] {
        assert_eq!(outcome.state(ModuleId(id)), Some(ModuleState::Unresolved));
    }
    assert!(outcome
        .get(ModuleId(3))
        .unwrap()
        .has_error(ResolverErrorKind::MissingImportedPackage));
    assert_eq!(outcome.state(ModuleId(4)), Some(ModuleState::Resolved));
}

#[test]
fn module_require_honours_version_range() {
    let mut r = resolver(vec![
        Module::new(1, "lib", v("1.5")),
        Module::new(2, "lib", v("2.1")),
        Module::new(3, "app", v("1.0")).requires(ModuleRequire::new("lib").version(range("[1.0,2.0)"))),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();
    assert_eq!(
        outcome.providers(ModuleId(3), &Namespace::Module),
        vec![ModuleId(1)]
    );
}

#[test]
fn multiple_cardinality_wires_every_match() {
    let filter = Filter::parse("(objectClass=log)").unwrap();
    let mut r = resolver(vec![
        Module::new(1, "log-a", v("1.0"))
            .provides(GenericCapability::new("acme.service").attribute("objectClass", "log")),
        Module::new(2, "log-b", v("1.0"))
            .provides(GenericCapability::new("acme.service").attribute("objectClass", "log")),
        Module::new(3, "http", v("1.0"))
            .provides(GenericCapability::new("acme.service").attribute("objectClass", "http")),
        Module::new(4, "app", v("1.0")).requires(
            GenericRequire::new("acme.service")
                .filter(filter.clone())
                .multiple(),
        ),
        Module::new(5, "tool", v("1.0")).requires(GenericRequire::new("acme.service").filter(filter)),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();
    let ns = Namespace::Generic("acme.service".to_string());

    let mut all = outcome.providers(ModuleId(4), &ns);
    all.sort();
    assert_eq!(all, vec![ModuleId(1), ModuleId(2)]);
    assert_eq!(outcome.providers(ModuleId(5), &ns).len(), 1);
}

#[test]
fn uses_constraint_steers_choice_away_from_split_package() {
    let mut r = resolver(split_package_catalog(PackageImport::new("q")));
    let outcome = r.resolve(None, &env()).unwrap();

    assert_eq!(outcome.state(ModuleId(3)), Some(ModuleState::Resolved));
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
    assert_eq!(outcome.package_provider(ModuleId(3), "q"), Some(ModuleId(2)));
}

#[test]
fn unavoidable_uses_conflict_fails_the_importer() {
    let mut r = resolver(split_package_catalog(
        PackageImport::new("q").version(range("[2.0,3.0)")),
    ));
    let outcome = r.resolve(None, &env()).unwrap();

    let app = outcome.get(ModuleId(3)).unwrap();
    assert!(!app.is_resolved());
    assert!(app.has_error(ResolverErrorKind::UsesConflict));
    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert_eq!(outcome.state(ModuleId(2)), Some(ModuleState::Resolved));
}

#[test]
fn exhausted_search_budget_keeps_the_first_combination() {
    let config = ResolverConfig {
        timeout_ms: Some(0),
        ..ResolverConfig::default()
    };
    let mut catalog = InMemoryCatalog::new();
    for m in split_package_catalog(PackageImport::new("q")) {
        catalog.add(m);
    }
    let mut r = Resolver::with_catalog(config, catalog);
    let outcome = r.resolve(None, &env()).unwrap();

    // The consistent choice (q from lib-two) is never reached.
    let app = outcome.get(ModuleId(3)).unwrap();
    assert!(!app.is_resolved());
    assert!(app.has_error(ResolverErrorKind::UsesConflict));
    assert_eq!(outcome.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert_eq!(outcome.state(ModuleId(2)), Some(ModuleState::Resolved));
}

#[test]
fn imports_with_identical_candidates_move_together_when_merged() {
    let config = ResolverConfig {
        max_multiple_suppliers: 0,
        ..ResolverConfig::default()
    };
    let mut catalog = InMemoryCatalog::new();
    for m in split_package_catalog(PackageImport::new("q")) {
        catalog.add(m);
    }
    catalog.add(Module::new(4, "other-app", v("1.0")).imports("p").imports("q"));
    let mut r = Resolver::with_catalog(config, catalog);
    let outcome = r.resolve(None, &env()).unwrap();

    for app in [ModuleId(3), ModuleId(4)] {
        assert_eq!(outcome.state(app), Some(ModuleState::Resolved));
        assert_eq!(outcome.package_provider(app, "p"), Some(ModuleId(2)));
        assert_eq!(outcome.package_provider(app, "q"), Some(ModuleId(2)));
    }
}

#[test]
fn conflicting_optional_import_is_dropped() {
    let mut r = resolver(split_package_catalog(
        PackageImport::new("q").version(range("[2.0,3.0)")).optional(),
    ));
    let outcome = r.resolve(None, &env()).unwrap();

    let app = outcome.get(ModuleId(3)).unwrap();
    assert!(app.is_resolved());
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
    assert_eq!(outcome.package_provider(ModuleId(3), "q"), None);
}

#[test]
fn reexported_module_constrains_package_imports() {
    let mut r = resolver(vec![
        Module::new(1, "lib", v("1.0")).exports("p"),
        Module::new(2, "facade", v("1.0")).requires(ModuleRequire::new("lib").reexport()),
        Module::new(3, "other", v("2.0")).exports("p"),
        Module::new(4, "app", v("1.0"))
            .requires(ModuleRequire::new("facade"))
            .imports("p"),
    ]);
    let outcome = r.resolve(None, &env()).unwrap();

    assert_eq!(outcome.state(ModuleId(4)), Some(ModuleState::Resolved));
    assert_eq!(outcome.package_provider(ModuleId(4), "p"), Some(ModuleId(1)));
}

#[test]
fn ineligible_modules_are_reported() {
    let linux = PlatformProperties::new()
        .execution_environment("JavaSE-11")
        .property("os", "linux");
    let environment = Environment::single(linux);

    let mut disabled = Module::new(1, "disabled", v("1.0")).exports("p");
    disabled.disabled = Some("disabled by admin".to_string());
    let mut needs_ee = Module::new(2, "modern", v("1.0"));
    needs_ee.required_execution_environments = vec!["JavaSE-17".to_string()];
    let mut windows = Module::new(3, "win", v("1.0"));
    windows.platform_filter = Some(Filter::parse("(os=win32)").unwrap());
    let mac_native = NativeCodeClause {
        paths: vec!["lib/libacme.dylib".to_string()],
        filter: Some(Filter::parse("(os=macos)").unwrap()),
    };
    let mut native = Module::new(4, "native", v("1.0"));
    native.native_code = vec![mac_native.clone()];
    let mut native_optional = Module::new(5, "native-opt", v("1.0"));
    native_optional.native_code = vec![mac_native];
    native_optional.native_code_optional = true;
    let consumer = Module::new(6, "consumer", v("1.0")).imports("p");

    let mut r = resolver(vec![
        disabled,
        needs_ee,
        windows,
        native,
        native_optional,
        consumer,
    ]);
    let outcome = r.resolve(None, &environment).unwrap();

    let expect = [
        (1, ResolverErrorKind::DisabledModule),
        (2, ResolverErrorKind::MissingExecutionEnvironment),
        (3, ResolverErrorKind::PlatformFilterMismatch),
        (4, ResolverErrorKind::InvalidNativeCode),
        (6, ResolverErrorKind::MissingImportedPackage),
    ];
    for (id, kind) in expect {
        let m = outcome.get(ModuleId(id)).unwrap();
        assert!(!m.is_resolved(), "{} should not resolve", m.name);
        assert!(m.has_error(kind), "{} should report {kind}", m.name);
    }
    assert_eq!(outcome.state(ModuleId(5)), Some(ModuleState::Resolved));
}

#[test]
fn identical_catalogs_resolve_identically() {
    let catalog = || {
        vec![
            Module::new(4, "x", v("1.0")).singleton().exports("s"),
            Module::new(7, "x", v("1.0")).singleton().exports("s"),
            Module::new(1, "a", v("1.0"))
                .provides(PackageExport::new("p", v("1.0")).uses(["q"]))
                .imports("q"),
            Module::new(2, "b", v("1.0")).exports("q").imports("p"),
            Module::new(3, "c", v("1.0")).exports("q"),
            Module::new(5, "app", v("1.0")).imports("p").imports("q").imports("s"),
        ]
    };
    let first = resolver(catalog()).resolve(None, &env()).unwrap();
    let second = resolver(catalog()).resolve(None, &env()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn resolving_again_changes_nothing() {
    let mut r = resolver(vec![
        Module::new(1, "lib", v("1.0"))
            .provides(PackageExport::new("p", v("1.0")).uses(["q"]))
            .exports("q"),
        Module::new(2, "app", v("1.0"))
            .imports("p")
            .imports("q")
            .requires(ModuleRequire::new("lib")),
        Module::new(3, "broken", v("1.0")).imports("missing"),
    ]);
    let first = r.resolve(None, &env()).unwrap();
    let second = r.resolve(None, &env()).unwrap();

    for m in second.modules.values() {
        assert!(!m.changed(), "{} changed state", m.name);
        let before = first.get(m.id).unwrap();
        assert_eq!(m.wiring, before.wiring);
        assert_eq!(m.errors, before.errors);
    }
}

#[test]
fn refreshing_a_removed_module_discards_it_and_unresolves_dependents() {
    let mut r = resolver(vec![
        Module::new(1, "provider", v("1.0")).exports("p"),
        Module::new(2, "app", v("1.0")).imports("p"),
    ]);
    r.resolve(None, &env()).unwrap();
    r.catalog_mut().unwrap().remove(ModuleId(1));
    add(&mut r, Module::new(3, "late", v("1.0")).imports("p"));

    let kept = r.resolve(None, &env()).unwrap();
    assert_eq!(kept.package_provider(ModuleId(2), "p"), Some(ModuleId(1)));
    assert_eq!(kept.state(ModuleId(3)), Some(ModuleState::Unresolved));
    assert!(r.catalog().unwrap().is_removal_pending(ModuleId(1)));

    let refreshed = r.resolve(Some(&[ModuleId(1)]), &env()).unwrap();
    assert_eq!(refreshed.discarded, vec![ModuleId(1)]);
    assert!(refreshed
        .get(ModuleId(2))
        .unwrap()
        .has_error(ResolverErrorKind::MissingImportedPackage));
    let catalog = r.catalog().unwrap();
    assert!(catalog.module(ModuleId(1)).is_none());
    assert!(catalog.wiring(ModuleId(2)).is_none());
}

#[test]
fn updated_metadata_takes_effect_on_refresh() {
    let mut r = resolver(vec![
        Module::new(1, "lib", v("1.0")).exports("p"),
        Module::new(2, "app", v("1.0")).imports("p"),
    ]);
    r.resolve(None, &env()).unwrap();

    let mut disabled = Module::new(1, "lib", v("1.0")).exports("p");
    disabled.disabled = Some("disabled by admin".to_string());
    r.catalog_mut().unwrap().update(disabled);
    assert_eq!(r.catalog().unwrap().state(ModuleId(1)), Some(ModuleState::Resolved));

    let untouched = r.resolve(None, &env()).unwrap();
    assert_eq!(untouched.state(ModuleId(1)), Some(ModuleState::Resolved));
    assert_eq!(untouched.package_provider(ModuleId(2), "p"), Some(ModuleId(1)));

    let outcome = r.resolve(Some(&[ModuleId(1)]), &env()).unwrap();
    let lib = outcome.get(ModuleId(1)).unwrap();
    assert!(!lib.is_resolved());
    assert!(lib.has_error(ResolverErrorKind::DisabledModule));
    assert!(outcome
        .get(ModuleId(2))
        .unwrap()
        .has_error(ResolverErrorKind::MissingImportedPackage));
}

#[test]
fn refresh_of_unknown_module_is_an_error() {
    let mut r = resolver(vec![Module::new(1, "a", v("1.0"))]);
    assert!(r.resolve(Some(&[ModuleId(99)]), &env()).is_err());
}

#[test]
fn preferred_module_overrides_version_order() {
    let mut catalog = InMemoryCatalog::new();
    catalog.add(Module::new(1, "new", v("2.0")).exports("p"));
    catalog.add(Module::new(2, "pinned", v("1.0")).exports("p"));
    catalog.add(Module::new(3, "app", v("1.0")).imports("p"));
    let config = ResolverConfig {
        preferred_module: Some("pinned".to_string()),
        ..ResolverConfig::default()
    };
    let mut r = Resolver::with_catalog(config, catalog);
    let outcome = r.resolve(None, &env()).unwrap();
    assert_eq!(outcome.package_provider(ModuleId(3), "p"), Some(ModuleId(2)));
}
