//! Chart template sources
//!
//! Templates use Helm's Go-template syntax. `<chart>` is replaced with the
//! chart name; literal sections lifted from generated records are escaped so
//! Helm never evaluates `{{` found in record data.

use serde_json::{Map, Value as JsonValue};

use deckhand_core::{Resource, is_cluster_scoped};

use crate::error::Result;

const CHART_TOKEN: &str = "<chart>";

/// Stands in for the namespace until the record is serialized
const NAMESPACE_SENTINEL: &str = "__deckhand_release_namespace__";

fn fill(template: &str, chart: &str) -> String {
    template.replace(CHART_TOKEN, chart)
}

/// Escape `{{` and `}}` so Helm prints them verbatim
pub(super) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push_str("{{\"{{\"}}");
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push_str("{{\"}}\"}}");
            rest = &tail[2..];
        } else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn yaml_block<T: serde::Serialize + ?Sized>(value: &T, indent: usize) -> Result<String> {
    let yaml = serde_yaml::to_string(value)?;
    let pad = " ".repeat(indent);
    Ok(escape(&yaml)
        .lines()
        .map(|line| format!("{pad}{line}\n"))
        .collect())
}

const HELPERS: &str = r#"{{/*
Expand the name of the chart.
*/}}
{{- define "<chart>.name" -}}
{{- default .Chart.Name .Values.nameOverride | trunc 63 | trimSuffix "-" }}
{{- end }}

{{/*
Create a default fully qualified app name, truncated to the 63 characters
allowed in DNS names.
*/}}
{{- define "<chart>.fullname" -}}
{{- if .Values.fullnameOverride }}
{{- .Values.fullnameOverride | trunc 63 | trimSuffix "-" }}
{{- else }}
{{- $name := default .Chart.Name .Values.nameOverride }}
{{- if contains $name .Release.Name }}
{{- .Release.Name | trunc 63 | trimSuffix "-" }}
{{- else }}
{{- printf "%s-%s" .Release.Name $name | trunc 63 | trimSuffix "-" }}
{{- end }}
{{- end }}
{{- end }}

{{- define "<chart>.chart" -}}
{{- printf "%s-%s" .Chart.Name .Chart.Version | replace "+" "_" | trunc 63 | trimSuffix "-" }}
{{- end }}

{{- define "<chart>.labels" -}}
helm.sh/chart: {{ include "<chart>.chart" . }}
{{ include "<chart>.selectorLabels" . }}
{{- if .Chart.AppVersion }}
app.kubernetes.io/version: {{ .Chart.AppVersion | quote }}
{{- end }}
app.kubernetes.io/managed-by: {{ .Release.Service }}
{{- end }}

{{- define "<chart>.selectorLabels" -}}
app.kubernetes.io/name: {{ include "<chart>.name" . }}
app.kubernetes.io/instance: {{ .Release.Name }}
{{- end }}

{{- define "<chart>.serviceAccountName" -}}
{{- if .Values.serviceAccount.create }}
{{- default (include "<chart>.fullname" .) .Values.serviceAccount.name }}
{{- else }}
{{- default "default" .Values.serviceAccount.name }}
{{- end }}
{{- end }}
"#;

pub(super) fn helpers(chart: &str) -> String {
    fill(HELPERS, chart)
}

const WORKLOAD_HEAD: &str = r#"apiVersion: apps/v1
kind: <kind>
metadata:
  name: {{ include "<chart>.fullname" . }}
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
spec:
  {{- if not .Values.autoscaling.enabled }}
  replicas: {{ .Values.replicaCount }}
  {{- end }}
"#;

const WORKLOAD_POD: &str = r#"  selector:
    matchLabels:
      {{- include "<chart>.selectorLabels" . | nindent 6 }}
  template:
    metadata:
      {{- with .Values.podAnnotations }}
      annotations:
        {{- toYaml . | nindent 8 }}
      {{- end }}
      labels:
        {{- include "<chart>.selectorLabels" . | nindent 8 }}
    spec:
      serviceAccountName: {{ include "<chart>.serviceAccountName" . }}
      {{- with .Values.imagePullSecrets }}
      imagePullSecrets:
        {{- toYaml . | nindent 8 }}
      {{- end }}
      {{- with .Values.nodeSelector }}
      nodeSelector:
        {{- toYaml . | nindent 8 }}
      {{- end }}
      containers:
        - name: {{ .Chart.Name }}
          image: "{{ .Values.image.repository }}:{{ .Values.image.tag | default .Chart.AppVersion }}"
          imagePullPolicy: {{ .Values.image.pullPolicy }}
          {{- with .Values.env }}
          env:
            {{- range $name, $value := . }}
            - name: {{ $name }}
              value: {{ $value | quote }}
            {{- end }}
          {{- end }}
          {{- with .Values.livenessProbe }}
          livenessProbe:
            {{- toYaml . | nindent 12 }}
          {{- end }}
          {{- with .Values.readinessProbe }}
          readinessProbe:
            {{- toYaml . | nindent 12 }}
          {{- end }}
          resources:
            {{- toYaml .Values.resources | nindent 12 }}
"#;

/// Fields of the primary container driven by values rather than copied
const TEMPLATED_CONTAINER_FIELDS: &[&str] = &[
    "name",
    "image",
    "imagePullPolicy",
    "env",
    "livenessProbe",
    "readinessProbe",
    "resources",
];

/// Fields of the pod spec driven by values rather than copied
const TEMPLATED_POD_FIELDS: &[&str] = &["containers", "serviceAccountName", "nodeSelector"];

/// Deployment or StatefulSet template derived from the generated workload record
///
/// Image, replicas, env, probes, resources and pod annotations come from values;
/// everything else in the record (ports, mounts, sidecars, volumes) is copied.
pub(super) fn workload(chart: &str, record: &Resource) -> Result<String> {
    let kind = record.kind().unwrap_or("Deployment");
    let mut out = fill(WORKLOAD_HEAD, chart).replace("<kind>", kind);

    if kind == "StatefulSet" {
        out.push_str(&fill(
            "  serviceName: {{ include \"<chart>.fullname\" . }}\n",
            chart,
        ));
        if let Some(policy) = record.get("spec.podManagementPolicy") {
            out.push_str(&yaml_block(
                &single("podManagementPolicy", policy.clone()),
                2,
            )?);
        }
    }
    out.push_str(&fill(WORKLOAD_POD, chart));

    let pod = record
        .get("spec.template.spec")
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default();
    let containers = pod
        .get("containers")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(JsonValue::Object(primary)) = containers.first() {
        let rest: Map<String, JsonValue> = primary
            .iter()
            .filter(|(key, _)| !TEMPLATED_CONTAINER_FIELDS.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !rest.is_empty() {
            out.push_str(&yaml_block(&rest, 10)?);
        }
    }
    if containers.len() > 1 {
        out.push_str(&yaml_block(&containers[1..], 8)?);
    }

    let pod_rest: Map<String, JsonValue> = pod
        .into_iter()
        .filter(|(key, _)| !TEMPLATED_POD_FIELDS.contains(&key.as_str()))
        .collect();
    if !pod_rest.is_empty() {
        out.push_str(&yaml_block(&pod_rest, 6)?);
    }

    if let Some(claims) = record.get("spec.volumeClaimTemplates") {
        out.push_str(&yaml_block(&single("volumeClaimTemplates", claims.clone()), 2)?);
    }
    Ok(out)
}

fn single(key: &str, value: JsonValue) -> Map<String, JsonValue> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

const SERVICE: &str = r#"{{- if .Values.service.enabled -}}
apiVersion: v1
kind: Service
metadata:
  name: {{ include "<chart>.fullname" . }}
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
spec:
  {{- if .Values.service.headless }}
  clusterIP: None
  {{- else }}
  type: {{ .Values.service.type }}
  {{- end }}
  ports:
    - port: {{ .Values.service.port }}
      targetPort: {{ .Values.service.targetPort }}
      protocol: TCP
      name: {{ .Values.service.portName }}
"#;

/// Service template, rendered only when `service.enabled` is set; ports
/// after the first are copied from the record
pub(super) fn service(chart: &str, record: Option<&Resource>) -> Result<String> {
    let mut out = fill(SERVICE, chart);
    let extra: Vec<JsonValue> = record
        .and_then(|r| r.get("spec.ports"))
        .and_then(JsonValue::as_array)
        .map(|ports| ports.iter().skip(1).cloned().collect())
        .unwrap_or_default();
    if !extra.is_empty() {
        out.push_str(&yaml_block(&extra, 4)?);
    }
    out.push_str(&fill(
        "  selector:\n    {{- include \"<chart>.selectorLabels\" . | nindent 4 }}\n{{- end }}\n",
        chart,
    ));
    Ok(out)
}

const SERVICE_ACCOUNT: &str = r#"{{- if .Values.serviceAccount.create -}}
apiVersion: v1
kind: ServiceAccount
metadata:
  name: {{ include "<chart>.serviceAccountName" . }}
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
  {{- with .Values.serviceAccount.annotations }}
  annotations:
    {{- toYaml . | nindent 4 }}
  {{- end }}
{{- end }}
"#;

pub(super) fn service_account(chart: &str) -> String {
    fill(SERVICE_ACCOUNT, chart)
}

const INGRESS: &str = r#"{{- if .Values.ingress.enabled -}}
{{- $fullName := include "<chart>.fullname" . -}}
{{- $svcPort := .Values.service.port -}}
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: {{ $fullName }}
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
  {{- with .Values.ingress.annotations }}
  annotations:
    {{- toYaml . | nindent 4 }}
  {{- end }}
spec:
  {{- with .Values.ingress.className }}
  ingressClassName: {{ . }}
  {{- end }}
  {{- if .Values.ingress.tls }}
  tls:
    {{- range .Values.ingress.tls }}
    - hosts:
        {{- range .hosts }}
        - {{ . | quote }}
        {{- end }}
      secretName: {{ .secretName }}
    {{- end }}
  {{- end }}
  rules:
    {{- range .Values.ingress.hosts }}
    - host: {{ .host | quote }}
      http:
        paths:
          {{- range .paths }}
          - path: {{ .path }}
            pathType: {{ .pathType }}
            backend:
              service:
                name: {{ $fullName }}
                port:
                  number: {{ $svcPort }}
          {{- end }}
    {{- end }}
{{- end }}
"#;

pub(super) fn ingress(chart: &str) -> String {
    fill(INGRESS, chart)
}

const HPA: &str = r#"{{- if .Values.autoscaling.enabled }}
apiVersion: autoscaling/v2
kind: HorizontalPodAutoscaler
metadata:
  name: {{ include "<chart>.fullname" . }}
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
spec:
  scaleTargetRef:
    apiVersion: apps/v1
    kind: <kind>
    name: {{ include "<chart>.fullname" . }}
  minReplicas: {{ .Values.autoscaling.minReplicas }}
  maxReplicas: {{ .Values.autoscaling.maxReplicas }}
  metrics:
    {{- if .Values.autoscaling.targetCPUUtilizationPercentage }}
    - type: Resource
      resource:
        name: cpu
        target:
          type: Utilization
          averageUtilization: {{ .Values.autoscaling.targetCPUUtilizationPercentage }}
    {{- end }}
    {{- if .Values.autoscaling.targetMemoryUtilizationPercentage }}
    - type: Resource
      resource:
        name: memory
        target:
          type: Utilization
          averageUtilization: {{ .Values.autoscaling.targetMemoryUtilizationPercentage }}
    {{- end }}
{{- end }}
"#;

pub(super) fn hpa(chart: &str, kind: &str) -> String {
    fill(HPA, chart).replace("<kind>", kind)
}

const NOTES: &str = r#"Thank you for installing {{ .Chart.Name }}.

Your release is named {{ .Release.Name }}.

{{- if .Values.ingress.enabled }}
Application URLs:
{{- range .Values.ingress.hosts }}
  http{{ if $.Values.ingress.tls }}s{{ end }}://{{ .host }}
{{- end }}
{{- else if contains "NodePort" .Values.service.type }}
  export NODE_PORT=$(kubectl get --namespace {{ .Release.Namespace }} -o jsonpath="{.spec.ports[0].nodePort}" services {{ include "<chart>.fullname" . }})
  export NODE_IP=$(kubectl get nodes --namespace {{ .Release.Namespace }} -o jsonpath="{.items[0].status.addresses[0].address}")
  echo http://$NODE_IP:$NODE_PORT
{{- else if contains "LoadBalancer" .Values.service.type }}
  kubectl get --namespace {{ .Release.Namespace }} svc -w {{ include "<chart>.fullname" . }}
{{- else }}
  kubectl --namespace {{ .Release.Namespace }} port-forward svc/{{ include "<chart>.fullname" . }} {{ .Values.service.port }}:{{ .Values.service.port }}
  echo "Visit http://127.0.0.1:{{ .Values.service.port }}"
{{- end }}
"#;

pub(super) fn notes(chart: &str, custom: Option<&str>) -> String {
    match custom {
        Some(text) => format!("{}\n", text.trim_end()),
        None => fill(NOTES, chart),
    }
}

const TEST_CONNECTION: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: "{{ include "<chart>.fullname" . }}-test-connection"
  labels:
    {{- include "<chart>.labels" . | nindent 4 }}
  annotations:
    "helm.sh/hook": test
spec:
  containers:
    - name: wget
      image: busybox:1.36
      command: ['wget']
      args: ['{{ include "<chart>.fullname" . }}:{{ .Values.service.port }}']
  restartPolicy: Never
"#;

pub(super) fn test_connection(chart: &str) -> String {
    fill(TEST_CONNECTION, chart)
}

pub(super) const HELMIGNORE: &str = r#"# Patterns to ignore when building packages.
.DS_Store
.git/
.gitignore
.bzr/
.hg/
.svn/
*.swp
*.bak
*.tmp
*.orig
*~
.project
.idea/
*.tmproj
.vscode/
"#;

/// A generated record as a chart template, bound to the release namespace
pub(super) fn resource(record: &Resource) -> Result<String> {
    let mut record = record.clone();
    let namespaced = !is_cluster_scoped(record.kind().unwrap_or_default());
    if namespaced {
        record.set_namespace(NAMESPACE_SENTINEL);
    }
    let yaml = escape(&record.to_yaml()?);
    Ok(yaml.replace(NAMESPACE_SENTINEL, "{{ .Release.Namespace }}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::{App, Builder, ConfigMap, StatefulApp};
    use deckhand_core::builder::{Companion, Storage};

    #[test]
    fn test_resource_template_uses_release_namespace() {
        let record = Resource::with_type("v1", "ConfigMap", "settings");
        let template = resource(&record).unwrap();
        assert!(template.contains("namespace: {{ .Release.Namespace }}\n"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a {{ b }} c"), "a {{\"{{\"}} b {{\"}}\"}} c");
        assert_eq!(escape("{x}"), "{x}");
    }

    #[test]
    fn test_cluster_scoped_resource_has_no_namespace() {
        let record = Resource::with_type("v1", "Namespace", "shop");
        assert!(!resource(&record).unwrap().contains("namespace"));
    }

    #[test]
    fn test_record_braces_are_escaped() {
        let records = ConfigMap::new("tpl")
            .add("greeting", "{{ name }}")
            .generate_kubernetes_resources()
            .unwrap();
        let template = resource(&records[0]).unwrap();
        assert!(template.contains("{{\"{{\"}} name {{\"}}\"}}"));
    }

    #[test]
    fn test_helpers_are_named_after_chart() {
        let helpers = helpers("shop");
        assert!(helpers.contains("define \"shop.fullname\""));
        assert!(!helpers.contains(CHART_TOKEN));
    }

    #[test]
    fn test_workload_template_copies_ports_and_sidecars() {
        let records = App::new("web")
            .image("nginx:1.21")
            .port(8080)
            .companion(Companion::sidecar("proxy", "envoy:1.29"))
            .generate_kubernetes_resources()
            .unwrap();
        let template = workload("web", &records[0]).unwrap();
        assert!(template.starts_with("apiVersion: apps/v1\nkind: Deployment\n"));
        assert!(template.contains("          ports:\n"));
        assert!(template.contains("containerPort: 8080"));
        assert!(template.contains("        - name: proxy\n"));
        assert!(!template.contains("nginx:1.21"));
    }

    #[test]
    fn test_stateful_template_keeps_claim_templates() {
        let records = StatefulApp::new("db")
            .image("postgres:16")
            .port(5432)
            .storage(Storage::new("data", "/var/lib/postgresql/data", "10Gi"))
            .generate_kubernetes_resources()
            .unwrap();
        let template = workload("db", &records[0]).unwrap();
        assert!(template.contains("kind: StatefulSet"));
        assert!(template.contains("serviceName: {{ include \"db.fullname\" . }}"));
        assert!(template.contains("  volumeClaimTemplates:\n"));
    }
}
