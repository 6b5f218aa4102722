//! Standard label and annotation keys stamped onto generated resources

/// Name of the generator, used as `app.kubernetes.io/managed-by`
pub const GENERATOR: &str = "deckhand";

/// Generator version
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

// Kubernetes recommended labels
pub const K8S_NAME: &str = "app.kubernetes.io/name";
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Short selector label shared by workloads and their Services
pub const APP: &str = "app";

// deckhand annotations
pub const GENERATED_BY: &str = "deckhand.io/generated-by";
pub const GENERATOR_VERSION_ANNOTATION: &str = "deckhand.io/version";

/// Pod-template annotation carrying a digest of mounted configuration
pub const CONFIG_CHECKSUM: &str = "checksum/config";

// Prometheus scrape annotations
pub const PROMETHEUS_SCRAPE: &str = "prometheus.io/scrape";
pub const PROMETHEUS_PORT: &str = "prometheus.io/port";
pub const PROMETHEUS_PATH: &str = "prometheus.io/path";
