use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::meta::ObjectMeta;
use crate::resource::Resource;

/// Horizontal autoscaling bounds and targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizontalScaling {
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_utilization: Option<u32>,
}

/// Replica count and optional autoscaling for an `App`
///
/// A HorizontalPodAutoscaler is only emitted once [`Scaling::horizontal`] has
/// been called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaling {
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalScaling>,
}

fn default_replicas() -> u32 {
    1
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            horizontal: None,
        }
    }
}

impl Scaling {
    pub fn fixed(replicas: u32) -> Self {
        Self {
            replicas,
            horizontal: None,
        }
    }

    /// Enable horizontal autoscaling between `min` and `max` replicas
    ///
    /// Targets 80% CPU unless another target is set.
    pub fn horizontal(mut self, min: u32, max: u32) -> Self {
        self.replicas = self.replicas.max(min);
        self.horizontal = Some(HorizontalScaling {
            min_replicas: min,
            max_replicas: max,
            cpu_utilization: Some(80),
            memory_utilization: None,
        });
        self
    }

    pub fn target_cpu(mut self, percent: u32) -> Self {
        if let Some(h) = &mut self.horizontal {
            h.cpu_utilization = Some(percent);
        }
        self
    }

    pub fn target_memory(mut self, percent: u32) -> Self {
        if let Some(h) = &mut self.horizontal {
            h.memory_utilization = Some(percent);
        }
        self
    }

    pub fn is_autoscaled(&self) -> bool {
        self.horizontal.is_some()
    }

    /// HorizontalPodAutoscaler targeting the Deployment named after `meta`
    pub(crate) fn autoscaler(&self, meta: &ObjectMeta) -> Option<Resource> {
        let h = self.horizontal.as_ref()?;
        let mut metrics = Vec::new();
        if let Some(cpu) = h.cpu_utilization {
            metrics.push(utilization_metric("cpu", cpu));
        }
        if let Some(memory) = h.memory_utilization {
            metrics.push(utilization_metric("memory", memory));
        }
        Some(Resource::new(json!({
            "apiVersion": "autoscaling/v2",
            "kind": "HorizontalPodAutoscaler",
            "metadata": meta.to_json(true),
            "spec": {
                "scaleTargetRef": {
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "name": meta.name(),
                },
                "minReplicas": h.min_replicas,
                "maxReplicas": h.max_replicas,
                "metrics": metrics,
            },
        })))
    }

    pub(crate) fn problems(&self, name: &str) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(h) = &self.horizontal {
            if h.min_replicas == 0 {
                problems.push(format!("App '{name}' autoscaling minimum must be at least 1"));
            }
            if h.max_replicas < h.min_replicas {
                problems.push(format!(
                    "App '{name}' autoscaling maximum {} is below minimum {}",
                    h.max_replicas, h.min_replicas
                ));
            }
            for target in [h.cpu_utilization, h.memory_utilization].into_iter().flatten() {
                if target == 0 || target > 100 {
                    problems.push(format!(
                        "App '{name}' autoscaling target {target}% is outside 1-100"
                    ));
                }
            }
        }
        problems
    }
}

fn utilization_metric(resource: &str, percent: u32) -> JsonValue {
    json!({
        "type": "Resource",
        "resource": {
            "name": resource,
            "target": {"type": "Utilization", "averageUtilization": percent},
        },
    })
}
