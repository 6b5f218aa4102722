//! Generated documentation, rendered with MiniJinja

use minijinja::value::Value;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use serde::Serialize;

use crate::error::Result;

const TERRAFORM_README: &str = r#"# {{ name }}

Terraform module generated by deckhand {{ generator_version }} for the
`{{ name }}` deployment.

## Usage

```hcl
module "{{ name | replace("-", "_") }}" {
  source = "./{{ directory }}"
{%- for variable in variables if variable.required %}
  {{ variable.name }} = "..."
{%- endfor %}
}
```

## Resources

| Type | Name |
|------|------|
{%- for resource in resources %}
| `{{ resource.type }}` | `{{ resource.name }}` |
{%- endfor %}

## Inputs

| Name | Type | Description | Default |
|------|------|-------------|---------|
{%- for variable in variables %}
| `{{ variable.name }}` | `{{ variable.type }}` | {{ variable.description | default("") }} | {% if variable.required %}required{% else %}`{{ variable.default | tojson }}`{% endif %} |
{%- endfor %}

## Outputs

{%- if outputs %}

| Name | Description |
|------|-------------|
{%- for output in outputs %}
| `{{ output.name }}` | {{ output.description | default("") }} |
{%- endfor %}
{%- else %}

This module has no outputs.
{%- endif %}
"#;

/// Serialize a value as compact JSON
fn tojson(value: Value) -> std::result::Result<String, Error> {
    let json: serde_json::Value = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    serde_json::to_string(&json).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn create_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.add_filter("tojson", tojson);
    env.add_template("terraform/README.md", TERRAFORM_README)?;
    Ok(env)
}

/// Render the README of a Terraform module
pub(crate) fn terraform_readme<S: Serialize>(context: S) -> Result<String> {
    let env = create_environment()?;
    let template = env.get_template("terraform/README.md")?;
    Ok(template.render(context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_readme_tables() {
        let readme = terraform_readme(json!({
            "name": "web",
            "directory": "terraform",
            "generator_version": "0.1.0",
            "resources": [{"type": "kubernetes_deployment_v1", "name": "web"}],
            "variables": [
                {"name": "namespace", "type": "string", "description": "Target namespace", "default": "default", "required": false},
                {"name": "image_tag", "type": "string", "description": "Image tag", "default": null, "required": true},
            ],
            "outputs": [],
        }))
        .unwrap();
        assert!(readme.starts_with("# web\n"));
        assert!(readme.contains("| `kubernetes_deployment_v1` | `web` |"));
        assert!(readme.contains("| `namespace` | `string` | Target namespace | `\"default\"` |"));
        assert!(readme.contains("| `image_tag` | `string` | Image tag | required |"));
        assert!(readme.contains("  image_tag = \"...\""));
        assert!(readme.contains("This module has no outputs."));
    }
}
