use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Plain text in, text out (prompt enhancement).
    Text,
    /// Image plus text in, text out (pose description).
    Vision,
    /// Returns inline image data.
    Image,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Vision => "vision",
            Capability::Image => "image",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
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
        self.models.get(normalize_model_name(name))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Models supporting `capability`, in registration order.
    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: Capability) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// `models/gemini-1.5-flash` and `gemini-1.5-flash` name the same model.
pub fn normalize_model_name(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed.strip_prefix("models/").unwrap_or(trimmed)
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[Capability]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities.to_vec(),
            },
        );
    };

    insert(
        "gemini-1.5-flash",
        "gemini",
        &[Capability::Text, Capability::Vision],
    );
    insert(
        "gemini-2.0-flash",
        "gemini",
        &[Capability::Text, Capability::Vision],
    );
    insert(
        "gemini-2.5-flash",
        "gemini",
        &[Capability::Text, Capability::Vision],
    );
    insert("gemini-2.5-flash-image-preview", "gemini", &[Capability::Image]);
    insert("gemini-2.5-flash-image", "gemini", &[Capability::Image]);
    insert("gemini-3-pro-image-preview", "gemini", &[Capability::Image]);
    insert(
        "dryrun-text-1",
        "dryrun",
        &[Capability::Text, Capability::Vision],
    );
    insert("dryrun-image-1", "dryrun", &[Capability::Image]);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_put_gemini_models_first_per_capability() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.by_capability(Capability::Text)[0].name,
            "gemini-1.5-flash"
        );
        assert_eq!(
            registry.by_capability(Capability::Image)[0].name,
            "gemini-2.5-flash-image-preview"
        );
    }

    #[test]
    fn lookup_accepts_models_prefix() {
        let registry = ModelRegistry::default();
        let spec = registry.get("models/gemini-2.0-flash");
        assert_eq!(spec.map(|model| model.name.as_str()), Some("gemini-2.0-flash"));
    }

    #[test]
    fn ensure_checks_capability() {
        let registry = ModelRegistry::default();
        assert!(registry
            .ensure("gemini-2.5-flash-image-preview", Capability::Image)
            .is_some());
        assert!(registry
            .ensure("gemini-2.5-flash-image-preview", Capability::Vision)
            .is_none());
        assert!(registry.ensure("missing", Capability::Text).is_none());
    }
}
