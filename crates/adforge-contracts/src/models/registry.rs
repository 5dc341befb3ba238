use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Outcome of resolving a requested model against the registry. When the
/// request cannot be honored the first capable default is used and the
/// reason is kept for the manifest and event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }

    pub fn resolve(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let (fallback_reason, requested_text) = match requested {
            Some(requested_value) => {
                if let Some(model) = self.ensure(requested_value, capability) {
                    return Ok(ModelSelection {
                        model,
                        requested: Some(requested_value.to_string()),
                        fallback_reason: None,
                    });
                }
                (
                    format!(
                        "Requested model '{requested_value}' unavailable for capability '{capability}'."
                    ),
                    Some(requested_value.to_string()),
                )
            }
            None => ("No model specified; using default.".to_string(), None),
        };

        let Some(model) = self.by_capability(capability).first().cloned() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason: Some(fallback_reason),
        })
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert =
        |name: &str, provider: &str, capabilities: &[&str], context_window: Option<u64>| {
            map.insert(
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: provider.to_string(),
                    capabilities: capabilities
                        .iter()
                        .map(|item| (*item).to_string())
                        .collect(),
                    context_window,
                },
            );
        };

    insert("gemini-2.5-flash", "gemini", &["text"], Some(1_048_576));
    insert(
        "gemini-3-pro-preview",
        "gemini",
        &["text", "vision"],
        Some(1_048_576),
    );
    insert("gemini-2.5-flash-image", "gemini", &["image"], None);
    insert("gemini-3-pro-image-preview", "gemini", &["image"], None);
    insert("dryrun-text-1", "dryrun", &["text"], Some(8192));
    insert("dryrun-image-1", "dryrun", &["image"], None);

    map
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{ModelRegistry, ModelSpec};

    fn image_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "dryrun".to_string(),
            capabilities: vec!["image".to_string()],
            context_window: None,
        }
    }

    #[test]
    fn defaults_prefer_gemini_for_both_capabilities() {
        let registry = ModelRegistry::new(None);
        let text = registry.by_capability("text");
        let image = registry.by_capability("image");
        assert_eq!(text.first().map(|model| model.provider.as_str()), Some("gemini"));
        assert_eq!(image.first().map(|model| model.provider.as_str()), Some("gemini"));
        assert!(text.iter().any(|model| model.provider == "dryrun"));
        assert!(image.iter().any(|model| model.provider == "dryrun"));
    }

    #[test]
    fn ensure_checks_the_capability() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure("gemini-2.5-flash-image", "image").is_some());
        assert!(registry.ensure("gemini-2.5-flash-image", "text").is_none());
        assert!(registry.ensure("missing", "image").is_none());
    }

    #[test]
    fn resolve_honors_a_capable_request() {
        let registry = ModelRegistry::new(None);
        let selection = registry
            .resolve(Some("gemini-3-pro-image-preview"), "image")
            .unwrap();
        assert_eq!(selection.model.name, "gemini-3-pro-image-preview");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn resolve_falls_back_when_requested_model_unavailable() {
        let mut models = IndexMap::new();
        models.insert("fallback-image".to_string(), image_model("fallback-image"));
        let selection = ModelRegistry::new(Some(models))
            .resolve(Some("missing"), "image")
            .unwrap();
        assert_eq!(selection.model.name, "fallback-image");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'image'.")
        );
    }

    #[test]
    fn resolve_without_request_uses_default_with_explanation() {
        let mut models = IndexMap::new();
        models.insert("default-image".to_string(), image_model("default-image"));
        let selection = ModelRegistry::new(Some(models))
            .resolve(None, "image")
            .unwrap();
        assert_eq!(selection.model.name, "default-image");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn resolve_errors_when_no_model_has_the_capability() {
        let mut models = IndexMap::new();
        models.insert(
            "text-only".to_string(),
            ModelSpec {
                name: "text-only".to_string(),
                provider: "dryrun".to_string(),
                capabilities: vec!["text".to_string()],
                context_window: None,
            },
        );
        let err = ModelRegistry::new(Some(models))
            .resolve(Some("anything"), "image")
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'image'.");
    }
}
