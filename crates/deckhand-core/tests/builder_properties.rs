//! Properties every builder must hold, checked across the whole builder set

use deckhand_core::builder::{
    Backup, ClusterRole, ClusterRoleBinding, Companion, Controller, Peer, Probe, PropertyType,
    ResourceRequirements, Role, RoleBinding, RoleRef, SchemaProperty, ServiceAccount, Storage,
};
use deckhand_core::{
    App, AppGroup, Builder, BuilderRegistry, ConfigMap, CoreError, CronJob, CustomResource,
    Ingress, Job, MissingSourcePolicy, Namespace, NetworkPolicy, Secret, Service, StatefulApp,
    encode,
};
use serde_json::json;
use std::time::Duration;

fn every_builder() -> Vec<Box<dyn Builder>> {
    let settings = ConfigMap::new("web-settings")
        .add("LOG_LEVEL", "info")
        .add_json("features.json", json!({"beta": true}));
    vec![
        Box::new(
            App::new("web")
                .image("nginx:1.21")
                .port(8080)
                .replicas(3)
                .env("MODE", "prod")
                .add_config_map(settings.clone())
                .add_secret(Secret::new("web-creds").add("TOKEN", "t"))
                .liveness(Probe::http("/healthz", 8080))
                .resources(ResourceRequirements::requests("100m", "128Mi").limits("1", "512Mi"))
                .companion(Companion::sidecar("proxy", "envoy:1.29").port(9901))
                .metrics(9090, "/metrics")
                .service_monitor()
                .ingress("web.example.com")
                .autoscale(2, 10)
                .add_job(Job::new("web-migrate").image("web:1").command(["migrate"]))
                .with_service_account(ServiceAccount::new("web")),
        ),
        Box::new(
            StatefulApp::new("postgres")
                .image("postgres:16")
                .port(5432)
                .replicas(3)
                .storage(Storage::new("data", "/var/lib/postgresql/data", "10Gi"))
                .backup(Backup::new("@daily", "postgres:16").command(["pg_dumpall"])),
        ),
        Box::new(Secret::new("s").add("k", "v")),
        Box::new(settings),
        Box::new(
            Job::new("report")
                .image("report:1")
                .backoff_limit(2)
                .active_deadline(Duration::from_secs(600)),
        ),
        Box::new(CronJob::new("cleanup", "*/15 * * * *").image("busybox:1.36")),
        Box::new(Service::new("legacy").port_mapping(80, 8080)),
        Box::new(Ingress::new("edge").route("shop.example.com", "/api", "api", 8080)),
        Box::new(
            NetworkPolicy::new("web-policy")
                .for_app("web")
                .allow_from(Peer::app("frontend"), 8080)
                .allow_dns(),
        ),
        Box::new(ServiceAccount::new("deployer")),
        Box::new(Role::new("reader").allow("", ["pods"], ["get", "list"])),
        Box::new(ClusterRole::new("node-reader").allow("", ["nodes"], ["get"])),
        Box::new(RoleBinding::new("read-pods", RoleRef::role("reader")).service_account("deployer")),
        Box::new(
            ClusterRoleBinding::new("read-nodes", RoleRef::cluster_role("node-reader"))
                .service_account("deployer"),
        ),
        Box::new(
            CustomResource::new("example.com", "v1", "Widget")
                .property("size", SchemaProperty::new(PropertyType::Integer).required())
                .controller(Controller::new("widget-operator:1"))
                .instance("small", json!({"size": 1})),
        ),
        Box::new(Namespace::new("shop")),
        Box::new(
            AppGroup::new("shop")
                .add(App::new("api").image("api:1").port(8080))
                .add(App::new("worker").image("worker:1")),
        ),
    ]
}

#[test]
fn test_generation_is_deterministic() {
    for builder in every_builder() {
        let first = builder.generate_kubernetes_resources().unwrap();
        let second = builder.generate_kubernetes_resources().unwrap();
        assert_eq!(first, second, "{} '{}'", builder.type_name(), builder.name());
    }
}

#[test]
fn test_every_record_is_complete() {
    for builder in every_builder() {
        let resources = builder.generate_kubernetes_resources().unwrap();
        assert!(!resources.is_empty(), "{} produced nothing", builder.type_name());
        for resource in &resources {
            assert!(
                resource.missing_fields().is_empty(),
                "{} '{}' produced an incomplete record: {:?}",
                builder.type_name(),
                builder.name(),
                resource.as_json()
            );
        }
    }
}

#[test]
fn test_cluster_scoped_records_carry_no_namespace() {
    for builder in every_builder() {
        for resource in builder.generate_kubernetes_resources().unwrap() {
            let kind = resource.kind().unwrap_or_default();
            if deckhand_core::is_cluster_scoped(kind) {
                assert_eq!(resource.namespace(), None, "{kind} should not be namespaced");
            }
        }
    }
}

#[test]
fn test_every_builder_round_trips_through_registry() {
    let registry = BuilderRegistry::with_builtins();
    for builder in every_builder() {
        let definition = encode(builder.as_ref()).unwrap();
        let decoded = registry.decode(definition).unwrap();
        assert_eq!(decoded.type_name(), builder.type_name());
        assert_eq!(
            decoded.generate_kubernetes_resources().unwrap(),
            builder.generate_kubernetes_resources().unwrap(),
            "{} '{}' changed across a round trip",
            builder.type_name(),
            builder.name()
        );
    }
}

#[test]
fn test_web_app_example() {
    let app = App::new("web").image("nginx:1.21").port(8080).replicas(3);
    let resources = app.generate_kubernetes_resources().unwrap();
    assert_eq!(resources.len(), 2);

    let deployment = &resources[0];
    assert_eq!(deployment.kind(), Some("Deployment"));
    assert_eq!(deployment.name(), Some("web"));
    assert_eq!(deployment.get("spec.replicas"), Some(&json!(3)));
    let containers = deployment
        .get("spec.template.spec.containers")
        .and_then(|c| c.as_array())
        .unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0]["image"], "nginx:1.21");
    assert_eq!(containers[0]["ports"][0]["containerPort"], 8080);

    let service = &resources[1];
    assert_eq!(service.kind(), Some("Service"));
    assert_eq!(service.name(), Some("web"));
    let ports = service.get("spec.ports").and_then(|p| p.as_array()).unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0]["targetPort"], 8080);
}

#[test]
fn test_secret_example() {
    let resources = Secret::new("s").add("k", "v").generate_kubernetes_resources().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].kind(), Some("Secret"));
    assert_eq!(resources[0].get("stringData"), Some(&json!({"k": "v"})));
}

#[test]
fn test_config_map_json_example() {
    let resources = ConfigMap::new("c")
        .add_json("cfg.json", json!({"a": 1}))
        .generate_kubernetes_resources()
        .unwrap();
    let text = resources[0]
        .get("data")
        .and_then(|d| d.get("cfg.json"))
        .and_then(|v| v.as_str())
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed, json!({"a": 1}));
}

#[test]
fn test_missing_file_source_is_typed_error() {
    let err = ConfigMap::new("c")
        .from_file("/nonexistent/deckhand/app.conf")
        .generate_kubernetes_resources()
        .unwrap_err();
    match err {
        CoreError::ConfigSource(source) => {
            assert_eq!(
                source.path().map(|p| p.display().to_string()).as_deref(),
                Some("/nonexistent/deckhand/app.conf")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_source_placeholder() {
    let resources = Secret::new("s")
        .from_file("/nonexistent/deckhand/key.pem")
        .missing_sources(MissingSourcePolicy::Placeholder)
        .generate_kubernetes_resources()
        .unwrap();
    let value = resources[0].get("stringData").and_then(|d| d.get("key.pem")).unwrap();
    assert_eq!(value, "# file not found: /nonexistent/deckhand/key.pem");
}

#[test]
fn test_file_sources_read_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("nginx.conf"), "server {}\n").unwrap();
    std::fs::write(dir.path().join("app.env"), "# comment\nPORT=8080\nHOST=\"0.0.0.0\"\n").unwrap();

    let resources = ConfigMap::new("files")
        .from_file(dir.path().join("nginx.conf"))
        .from_env_file(dir.path().join("app.env"))
        .generate_kubernetes_resources()
        .unwrap();
    let data = resources[0].get("data").unwrap();
    assert_eq!(data["nginx.conf"], "server {}\n");
    assert_eq!(data["PORT"], "8080");
    assert_eq!(data["HOST"], "0.0.0.0");
}

#[test]
fn test_nested_records_share_owner_namespace() {
    let app = App::new("web")
        .namespace("shop")
        .image("nginx")
        .port(80)
        .ingress("shop.example.com")
        .add_config_map(ConfigMap::new("c").add("k", "v"))
        .add_secret(Secret::new("s").add("k", "v"))
        .add_job(Job::new("migrate").image("migrate:1"))
        .add_cron_job(CronJob::new("nightly", "@daily").image("report:1"));
    let resources = app.generate_kubernetes_resources().unwrap();
    assert!(resources.len() >= 7);
    for record in &resources {
        assert_eq!(
            record.namespace(),
            Some("shop"),
            "{} {:?} left its owner's namespace",
            record.kind().unwrap_or_default(),
            record.name()
        );
    }

    let db = StatefulApp::new("db")
        .namespace("data")
        .image("postgres:16")
        .port(5432)
        .add_config_map(ConfigMap::new("db-init").add("init.sql", "select 1;"));
    let resources = db.generate_kubernetes_resources().unwrap();
    assert!(resources.iter().all(|r| r.namespace() == Some("data")));
}

#[test]
fn test_nested_record_keeps_explicit_namespace() {
    let resources = App::new("web")
        .namespace("shop")
        .image("nginx")
        .add_config_map(ConfigMap::new("shared").namespace("platform").add("k", "v"))
        .generate_kubernetes_resources()
        .unwrap();
    let config = resources
        .iter()
        .find(|r| r.kind() == Some("ConfigMap"))
        .unwrap();
    assert_eq!(config.namespace(), Some("platform"));
}
