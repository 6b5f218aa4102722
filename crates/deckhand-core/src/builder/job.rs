//! Run-to-completion workloads: `Job` and scheduled `CronJob`

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::time::Duration;

use super::meta::{ObjectMeta, meta_setters};
use super::workload::{ResourceRequirements, env_list};
use super::{Builder, OutputFormat, tagged_definition};
use crate::error::Result;
use crate::names;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    #[default]
    OnFailure,
    Never,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnFailure => "OnFailure",
            Self::Never => "Never",
        }
    }
}

/// What a CronJob does when a run is still active at the next schedule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyPolicy {
    #[default]
    Allow,
    Forbid,
    Replace,
}

impl ConcurrencyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Forbid => "Forbid",
            Self::Replace => "Replace",
        }
    }
}

impl std::str::FromStr for ConcurrencyPolicy {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "forbid" => Ok(Self::Forbid),
            "replace" => Ok(Self::Replace),
            other => Err(crate::error::CoreError::invalid_value(
                "concurrencyPolicy",
                format!("'{other}' is not one of Allow, Forbid, Replace"),
            )),
        }
    }
}

/// Pod and completion settings shared by `Job` and `CronJob`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(default)]
    pub restart_policy: RestartPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_deadline: Option<Duration>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub ttl_after_finished: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

impl JobTemplate {
    /// Job `spec` for a container named `name`
    fn job_spec(&self, name: &str, pod_labels: JsonValue) -> JsonValue {
        let mut container = Map::new();
        container.insert("name".into(), json!(name));
        container.insert(
            "image".into(),
            json!(self.image.as_deref().unwrap_or("busybox:latest")),
        );
        if !self.command.is_empty() {
            container.insert("command".into(), json!(self.command));
        }
        if !self.args.is_empty() {
            container.insert("args".into(), json!(self.args));
        }
        if !self.env.is_empty() {
            container.insert("env".into(), env_list(&self.env));
        }
        if let Some(resources) = &self.resources {
            container.insert("resources".into(), resources.to_json());
        }

        let mut pod_spec = Map::new();
        if let Some(account) = &self.service_account {
            pod_spec.insert("serviceAccountName".into(), json!(account));
        }
        pod_spec.insert("restartPolicy".into(), json!(self.restart_policy.as_str()));
        pod_spec.insert("containers".into(), json!([container]));

        let mut spec = Map::new();
        if let Some(limit) = self.backoff_limit {
            spec.insert("backoffLimit".into(), json!(limit));
        }
        if let Some(completions) = self.completions {
            spec.insert("completions".into(), json!(completions));
        }
        if let Some(parallelism) = self.parallelism {
            spec.insert("parallelism".into(), json!(parallelism));
        }
        if let Some(deadline) = self.active_deadline {
            spec.insert("activeDeadlineSeconds".into(), json!(deadline.as_secs()));
        }
        if let Some(ttl) = self.ttl_after_finished {
            spec.insert("ttlSecondsAfterFinished".into(), json!(ttl.as_secs()));
        }
        spec.insert(
            "template".into(),
            json!({"metadata": {"labels": pod_labels}, "spec": pod_spec}),
        );
        JsonValue::Object(spec)
    }

    fn problems(&self, what: &str, name: &str) -> Vec<String> {
        let mut problems = Vec::new();
        if self.image.is_none() {
            problems.push(format!("{what} '{name}' has no image; busybox:latest will be used"));
        }
        if let (Some(completions), Some(parallelism)) = (self.completions, self.parallelism) {
            if parallelism > completions {
                problems.push(format!(
                    "{what} '{name}' runs {parallelism} pods in parallel for only {completions} completions"
                ));
            }
        }
        problems
    }
}

/// Implements the pod setters shared by `Job` and `CronJob`
macro_rules! template_setters {
    () => {
        pub fn image(mut self, image: impl Into<String>) -> Self {
            self.template.image = Some(image.into());
            self
        }

        pub fn command<I, S>(mut self, command: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.template.command = command.into_iter().map(Into::into).collect();
            self
        }

        pub fn args<I, S>(mut self, args: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.template.args = args.into_iter().map(Into::into).collect();
            self
        }

        pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.template.env.insert(key.into(), value.into());
            self
        }

        pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
            self.template.restart_policy = policy;
            self
        }

        pub fn backoff_limit(mut self, limit: u32) -> Self {
            self.template.backoff_limit = Some(limit);
            self
        }

        pub fn completions(mut self, completions: u32) -> Self {
            self.template.completions = Some(completions);
            self
        }

        pub fn parallelism(mut self, parallelism: u32) -> Self {
            self.template.parallelism = Some(parallelism);
            self
        }

        pub fn active_deadline(mut self, deadline: Duration) -> Self {
            self.template.active_deadline = Some(deadline);
            self
        }

        /// Delete the finished Job after `ttl`
        pub fn ttl_after_finished(mut self, ttl: Duration) -> Self {
            self.template.ttl_after_finished = Some(ttl);
            self
        }

        pub fn resources(mut self, resources: ResourceRequirements) -> Self {
            self.template.resources = Some(resources);
            self
        }

        pub fn service_account_name(mut self, name: impl Into<String>) -> Self {
            self.template.service_account = Some(name.into());
            self
        }

        pub fn template(&self) -> &JobTemplate {
            &self.template
        }
    };
}

/// A one-off Job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(flatten)]
    meta: ObjectMeta,

    #[serde(flatten)]
    template: JobTemplate,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            template: JobTemplate::default(),
        }
    }

    meta_setters!(meta);
    template_setters!();

    fn pod_labels(&self) -> JsonValue {
        let mut labels = self.meta.all_labels();
        labels.insert("job-name".into(), self.meta.name().to_string());
        super::meta::string_map(&labels)
    }
}

impl Builder for Job {
    fn type_name(&self) -> &'static str {
        "Job"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let spec = self.template.job_spec(self.meta.name(), self.pod_labels());
        Ok(vec![Resource::new(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": self.meta.to_json(true),
            "spec": spec,
        }))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("Job");
        problems.extend(self.template.problems("Job", self.meta.name()));
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "Job '{}' has no compose equivalent and is skipped",
                self.meta.name()
            )],
            _ => Vec::new(),
        }
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}

/// A Job run on a cron schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(flatten)]
    meta: ObjectMeta,

    schedule: String,

    #[serde(default)]
    concurrency_policy: ConcurrencyPolicy,

    #[serde(default)]
    suspend: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    successful_jobs_history_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_jobs_history_limit: Option<u32>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    starting_deadline: Option<Duration>,

    #[serde(flatten)]
    template: JobTemplate,
}

impl CronJob {
    /// `schedule` is a five-field cron expression or an `@hourly`-style macro
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name),
            schedule: schedule.into(),
            concurrency_policy: ConcurrencyPolicy::Allow,
            suspend: false,
            successful_jobs_history_limit: None,
            failed_jobs_history_limit: None,
            starting_deadline: None,
            template: JobTemplate::default(),
        }
    }

    meta_setters!(meta);
    template_setters!();

    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = schedule.into();
        self
    }

    pub fn concurrency_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency_policy = policy;
        self
    }

    pub fn suspend(mut self, suspend: bool) -> Self {
        self.suspend = suspend;
        self
    }

    pub fn history_limits(mut self, successful: u32, failed: u32) -> Self {
        self.successful_jobs_history_limit = Some(successful);
        self.failed_jobs_history_limit = Some(failed);
        self
    }

    pub fn starting_deadline(mut self, deadline: Duration) -> Self {
        self.starting_deadline = Some(deadline);
        self
    }

    pub fn get_schedule(&self) -> &str {
        &self.schedule
    }

    /// Schedule in canonical five-field form, if it parses
    pub fn normalized_schedule(&self) -> Option<String> {
        names::normalize_cron(&self.schedule)
    }
}

impl Builder for CronJob {
    fn type_name(&self) -> &'static str {
        "CronJob"
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    fn generate_kubernetes_resources(&self) -> Result<Vec<Resource>> {
        let schedule = self
            .normalized_schedule()
            .unwrap_or_else(|| self.schedule.trim().to_string());

        let mut labels = self.meta.all_labels();
        labels.insert("cronjob-name".into(), self.meta.name().to_string());
        let job_spec = self
            .template
            .job_spec(self.meta.name(), super::meta::string_map(&labels));

        let mut spec = Map::new();
        spec.insert("schedule".into(), json!(schedule));
        spec.insert(
            "concurrencyPolicy".into(),
            json!(self.concurrency_policy.as_str()),
        );
        if self.suspend {
            spec.insert("suspend".into(), json!(true));
        }
        if let Some(limit) = self.successful_jobs_history_limit {
            spec.insert("successfulJobsHistoryLimit".into(), json!(limit));
        }
        if let Some(limit) = self.failed_jobs_history_limit {
            spec.insert("failedJobsHistoryLimit".into(), json!(limit));
        }
        if let Some(deadline) = self.starting_deadline {
            spec.insert(
                "startingDeadlineSeconds".into(),
                json!(deadline.as_secs()),
            );
        }
        spec.insert("jobTemplate".into(), json!({"spec": job_spec}));

        Ok(vec![Resource::new(json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "metadata": self.meta.to_json(true),
            "spec": spec,
        }))])
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = self.meta.name_problems("CronJob");
        if self.meta.name().len() > 52 {
            problems.push(format!(
                "CronJob '{}' name exceeds 52 characters; generated Job names will be truncated",
                self.meta.name()
            ));
        }
        if self.normalized_schedule().is_none() {
            problems.push(format!(
                "CronJob '{}' has invalid schedule '{}'",
                self.meta.name(),
                self.schedule
            ));
        }
        problems.extend(self.template.problems("CronJob", self.meta.name()));
        problems
    }

    fn compatibility(&self, format: OutputFormat) -> Vec<String> {
        match format {
            OutputFormat::Compose => vec![format!(
                "CronJob '{}' has no compose equivalent and is skipped",
                self.meta.name()
            )],
            _ => Vec::new(),
        }
    }

    fn to_definition(&self) -> Result<JsonValue> {
        tagged_definition(self.type_name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record() {
        let job = Job::new("migrate")
            .image("app:1.0")
            .command(["./migrate", "up"])
            .backoff_limit(2)
            .ttl_after_finished(Duration::from_secs(600));
        let resources = job.generate_kubernetes_resources().unwrap();
        assert_eq!(resources.len(), 1);
        let job = &resources[0];
        assert_eq!(job.kind(), Some("Job"));
        assert_eq!(job.get("spec.backoffLimit"), Some(&json!(2)));
        assert_eq!(job.get("spec.ttlSecondsAfterFinished"), Some(&json!(600)));
        assert_eq!(
            job.get("spec.template.spec.restartPolicy"),
            Some(&json!("OnFailure"))
        );
        assert_eq!(
            job.get("spec.template.spec.containers")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("command")),
            Some(&json!(["./migrate", "up"]))
        );
    }

    #[test]
    fn test_cronjob_normalizes_schedule() {
        let cron = CronJob::new("report", "@daily")
            .image("report:1")
            .concurrency_policy(ConcurrencyPolicy::Forbid);
        let resources = cron.generate_kubernetes_resources().unwrap();
        assert_eq!(resources[0].get("spec.schedule"), Some(&json!("0 0 * * *")));
        assert_eq!(
            resources[0].get("spec.concurrencyPolicy"),
            Some(&json!("Forbid"))
        );
        assert!(resources[0].get("spec.jobTemplate.spec.template").is_some());
        assert!(cron.validate().is_empty());
    }

    #[test]
    fn test_cronjob_rejects_bad_schedule() {
        let cron = CronJob::new("report", "every day").image("report:1");
        let problems = cron.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("invalid schedule"));
    }

    #[test]
    fn test_concurrency_policy_parse() {
        assert_eq!(
            "replace".parse::<ConcurrencyPolicy>().unwrap(),
            ConcurrencyPolicy::Replace
        );
        assert!("sometimes".parse::<ConcurrencyPolicy>().is_err());
    }

    #[test]
    fn test_definition_uses_humantime() {
        let job = Job::new("migrate")
            .image("app:1.0")
            .active_deadline(Duration::from_secs(90));
        let def = job.to_definition().unwrap();
        assert_eq!(def["type"], "Job");
        assert_eq!(def["activeDeadline"], "1m 30s");
        let back: Job = serde_json::from_value(def).unwrap();
        assert_eq!(back, job);
    }
}
