//! End-to-end rendering through the generator facade

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::Path;
use tar::Archive;
use tempfile::TempDir;

use deckhand_core::builder::Storage;
use deckhand_core::labels;
use deckhand_core::{App, AppGroup, Builder, ConfigMap, OutputFormat, Resource, Secret, StatefulApp};
use deckhand_render::{
    Chart, ChartRenderer, GenerateExt, KubernetesRenderer, Overlay, OutputSettings, YamlOptions,
};

fn web() -> App {
    App::new("web").image("nginx:1.21").port(8080).replicas(3)
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path.as_ref())
        .unwrap_or_else(|e| panic!("{}: {e}", path.as_ref().display()))
}

#[test]
fn test_all_formats_layout() {
    let dir = TempDir::new().unwrap();
    web().generate().to_all_formats(dir.path(), &[]).unwrap();

    for path in [
        "k8s/deployment-web.yaml",
        "k8s/service-web.yaml",
        "docker-compose.yml",
        "charts/web/Chart.yaml",
        "charts/web/values.yaml",
        "charts/web/templates/deployment.yaml",
        "kustomize/base/kustomization.yaml",
        "kustomize/base/deployment-web.yaml",
        "terraform/main.tf",
        "terraform/README.md",
    ] {
        assert!(dir.path().join(path).is_file(), "missing {path}");
    }

    let deployment: serde_yaml::Value =
        serde_yaml::from_str(&read(dir.path().join("k8s/deployment-web.yaml"))).unwrap();
    assert_eq!(deployment["spec"]["replicas"], serde_yaml::Value::from(3));
    assert_eq!(deployment["metadata"]["namespace"], serde_yaml::Value::from("default"));

    let compose = read(dir.path().join("docker-compose.yml"));
    assert!(compose.contains("8080:8080"));
    let chart: serde_yaml::Value =
        serde_yaml::from_str(&read(dir.path().join("charts/web/Chart.yaml"))).unwrap();
    assert_eq!(chart["appVersion"], serde_yaml::Value::from("1.21"));
    assert!(read(dir.path().join("terraform/main.tf")).contains("resource \"kubernetes_deployment_v1\" \"web\""));
}

#[test]
fn test_all_formats_with_settings() {
    let dir = TempDir::new().unwrap();
    let settings = OutputSettings {
        yaml: YamlOptions::single_file("all.yaml"),
        chart: Some(Chart::new("frontend").version("2.0.0").unwrap()),
        overlays: vec![Overlay::new("prod").replicas("Deployment", "web", 5)],
        ..OutputSettings::default()
    };
    web()
        .generate()
        .to_all_formats_with(
            dir.path(),
            &[OutputFormat::Kubernetes, OutputFormat::Helm, OutputFormat::Kustomize],
            settings,
        )
        .unwrap();

    let combined = read(dir.path().join("k8s/all.yaml"));
    assert_eq!(combined.matches("---\n").count(), 1);
    let chart: serde_yaml::Value =
        serde_yaml::from_str(&read(dir.path().join("charts/frontend/Chart.yaml"))).unwrap();
    assert_eq!(chart["version"], serde_yaml::Value::from("2.0.0"));
    assert!(dir.path().join("kustomize/overlays/prod/kustomization.yaml").is_file());
    assert!(!dir.path().join("docker-compose.yml").exists());
    assert!(!dir.path().join("terraform").exists());
}

#[test]
fn test_apply_order_and_namespace_injection() {
    let group = AppGroup::new("shop")
        .add(web())
        .add(ConfigMap::new("settings").add("A", "1"))
        .add(Secret::new("creds").add("k", "v"));
    let records = group.generate_kubernetes_resources().unwrap();

    let kinds: Vec<String> = KubernetesRenderer::default()
        .prepare(&records)
        .iter()
        .map(|r| r.kind().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["ConfigMap", "Secret", "Service", "Deployment"]);

    let cluster = KubernetesRenderer::default().prepare(&[
        Resource::with_type("v1", "Namespace", "shop"),
        Resource::with_type("rbac.authorization.k8s.io/v1", "ClusterRole", "reader"),
    ]);
    assert!(cluster.iter().all(|r| r.namespace().is_none()));
}

#[test]
fn test_renderers_leave_cached_records_untouched() {
    let app = web();
    let generator = app.generate();
    let before = generator.resources().unwrap().to_vec();
    let dir = TempDir::new().unwrap();
    generator.to_yaml(dir.path()).unwrap();
    assert_eq!(generator.resources().unwrap(), before.as_slice());
    assert!(!before[0].annotations().contains_key(labels::GENERATED_BY));
}

#[test]
fn test_chart_package() {
    let db = StatefulApp::new("postgres")
        .image("postgres:16")
        .port(5432)
        .storage(Storage::new("data", "/var/lib/postgresql/data", "10Gi"));
    let records = db.generate_kubernetes_resources().unwrap();
    let dir = TempDir::new().unwrap();
    let archive = ChartRenderer::new(Chart::for_builder(&db))
        .package(&db, &records, dir.path())
        .unwrap();
    assert_eq!(archive, dir.path().join("postgres-0.1.0.tgz"));

    let mut entries: Vec<String> = Archive::new(GzDecoder::new(File::open(&archive).unwrap()))
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    entries.sort();
    assert!(entries.contains(&"postgres/Chart.yaml".to_string()));
    assert!(entries.contains(&"postgres/templates/statefulset.yaml".to_string()));
    assert!(entries.iter().all(|e| e.starts_with("postgres/")));
}
