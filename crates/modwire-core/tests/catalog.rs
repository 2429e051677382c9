use modwire_core::attrs::AttrValue;
use modwire_core::capability::Capability;
use modwire_core::catalog::{Catalog, CatalogFixture, InMemoryCatalog};
use modwire_core::module::{Module, ModuleId, ModuleState};
use modwire_core::outcome::{ModuleOutcome, ResolutionOutcome};
use modwire_core::requirement::{ImportResolution, Namespace, Requirement};
use modwire_core::version::Version;
use modwire_core::wiring::{ModuleWiring, RequirementRef, Wire};

const FIXTURE: &str = r#"
[[environment.alternatives]]
execution-environments = ["JavaSE-17"]
properties = { os = "linux", version = "6.1" }

[[module]]
id = 1
name = "app"
version = "1.0"

[[module.requirements]]
kind = "package"
name = "org.acme.util"
version = "[1.0,2.0)"

[[module.requirements]]
kind = "package"
name = "org.acme.*"
resolution = "dynamic"

[[module]]
id = 2
name = "util"
version = "1.2.0"
singleton = true

[[module.capabilities]]
kind = "package"
name = "org.acme.util"
version = "1.2"
uses = ["org.acme.base"]

[[module.capabilities]]
kind = "generic"
namespace = "acme.service"
attributes = { name = "logger", version = "2.1" }
"#;

fn resolved_outcome(id: u64, wires: Vec<Wire>) -> ModuleOutcome {
    ModuleOutcome {
        id: ModuleId(id),
        name: format!("m{id}"),
        version: Version::new(1, 0, 0),
        previous_state: ModuleState::Unresolved,
        state: ModuleState::Resolved,
        wiring: ModuleWiring::new(wires),
        errors: vec![],
        hosts: vec![],
    }
}

#[test]
fn fixture_parses_modules_and_environment() {
    let fixture = CatalogFixture::parse_toml(FIXTURE).unwrap();
    assert_eq!(fixture.modules.len(), 2);
    assert_eq!(fixture.environment.alternatives.len(), 1);

    let app = &fixture.modules[0];
    assert_eq!(app.version, Version::new(1, 0, 0));
    match &app.requirements[1] {
        Requirement::Package(p) => assert_eq!(p.resolution, ImportResolution::Dynamic),
        other => panic!("unexpected requirement {other:?}"),
    }

    let util = &fixture.modules[1];
    assert!(util.singleton);
    match &util.capabilities[1] {
        Capability::Generic(g) => {
            assert_eq!(
                g.attributes.get("version"),
                Some(&AttrValue::Version(Version::new(2, 1, 0)))
            );
            assert_eq!(g.attributes.get("name"), Some(&AttrValue::Str("logger".into())));
        }
        other => panic!("unexpected capability {other:?}"),
    }
}

#[test]
fn fixture_rejects_duplicate_ids() {
    let err = CatalogFixture::parse_toml(
        r#"
[[module]]
id = 1
name = "a"

[[module]]
id = 1
name = "b"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate module id 1"));
}

#[test]
fn fixture_rejects_bad_versions() {
    let err = CatalogFixture::parse_toml(
        r#"
[[module]]
id = 1
name = "a"
version = "one"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Catalog error"));
}

#[test]
fn removing_unresolved_module_drops_it() {
    let mut catalog = InMemoryCatalog::new();
    catalog.add(Module::new(1, "a", Version::new(1, 0, 0)));
    assert!(catalog.remove(ModuleId(1)).is_some());
    assert!(catalog.module(ModuleId(1)).is_none());
    assert!(catalog.removal_pending().is_empty());
}

#[test]
fn removing_resolved_module_keeps_it_pending() {
    let mut catalog = InMemoryCatalog::new();
    catalog.add(Module::new(1, "a", Version::new(1, 0, 0)));
    let mut outcome = ResolutionOutcome::default();
    outcome.modules.insert(ModuleId(1), resolved_outcome(1, vec![]));
    catalog.commit(&outcome);
    assert_eq!(catalog.state(ModuleId(1)), Some(ModuleState::Resolved));

    catalog.remove(ModuleId(1));
    assert!(catalog.is_removal_pending(ModuleId(1)));
    assert!(catalog.modules().is_empty());
    assert_eq!(catalog.removal_pending().len(), 1);

    let outcome = ResolutionOutcome {
        discarded: vec![ModuleId(1)],
        ..Default::default()
    };
    catalog.commit(&outcome);
    assert!(catalog.module(ModuleId(1)).is_none());
}

#[test]
fn commit_dynamic_appends_a_wire() {
    let mut catalog = InMemoryCatalog::new();
    catalog.add(Module::new(1, "a", Version::new(1, 0, 0)));
    let wire = Wire {
        namespace: Namespace::Package,
        name: "p".into(),
        requirer: ModuleId(1),
        requirement: RequirementRef::declared(ModuleId(1), 0),
        provider: ModuleId(2),
        capability: None,
    };
    catalog.commit_dynamic(&wire);
    assert_eq!(catalog.wiring(ModuleId(1)).unwrap().wires, vec![wire]);
}

#[test]
fn next_id_skips_used_ids() {
    let mut catalog = InMemoryCatalog::new();
    catalog.add(Module::new(4, "a", Version::new(1, 0, 0)));
    catalog.add(Module::new(2, "b", Version::new(1, 0, 0)));
    assert_eq!(catalog.next_id(), ModuleId(5));
}
