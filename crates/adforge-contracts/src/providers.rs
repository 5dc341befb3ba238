/// Anything addressable by a stable provider name (copy generators, image
/// studios).
pub trait NamedProvider {
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry<T: NamedProvider> {
    providers: Vec<T>,
}

impl<T: NamedProvider> Default for ProviderRegistry<T> {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
        }
    }
}

impl<T: NamedProvider> ProviderRegistry<T> {
    pub fn new(providers: Vec<T>) -> Self {
        Self { providers }
    }

    /// Later registrations win for a duplicate name.
    pub fn register(&mut self, provider: T) {
        self.providers
            .retain(|existing| existing.name() != provider.name());
        self.providers.push(provider);
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names = self
            .providers
            .iter()
            .map(|provider| provider.name().to_string())
            .collect::<Vec<String>>();
        names.sort();
        names
    }

    pub fn providers(&self) -> &[T] {
        self.providers.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::{NamedProvider, ProviderRegistry};

    #[derive(Clone, Debug)]
    struct DummyStudio {
        name: String,
    }

    impl NamedProvider for DummyStudio {
        fn name(&self) -> &str {
            self.name.as_str()
        }
    }

    fn registry() -> ProviderRegistry<DummyStudio> {
        ProviderRegistry::new(vec![
            DummyStudio {
                name: "gemini".to_string(),
            },
            DummyStudio {
                name: "dryrun".to_string(),
            },
        ])
    }

    #[test]
    fn get_finds_providers_by_name() {
        let registry = registry();
        assert!(registry.get("gemini").is_some());
        assert!(registry.get("dryrun").is_some());
        assert!(registry.get("stability").is_none());
    }

    #[test]
    fn register_replaces_an_existing_name() {
        let mut registry = ProviderRegistry::default();
        registry.register(DummyStudio {
            name: "dryrun".to_string(),
        });
        registry.register(DummyStudio {
            name: "dryrun".to_string(),
        });
        assert_eq!(registry.providers().len(), 1);
        assert_eq!(registry.list(), vec!["dryrun"]);
    }

    #[test]
    fn list_is_sorted_but_registration_order_is_kept() {
        let registry = registry();
        assert_eq!(registry.list(), vec!["dryrun", "gemini"]);
        assert_eq!(
            registry
                .providers()
                .iter()
                .map(|provider| provider.name().to_string())
                .collect::<Vec<String>>(),
            vec!["gemini", "dryrun"]
        );
    }
}
