//! Engine configuration.

use rustc_hash::FxHashMap;

use tether_registry::DEFAULT_MAX_ARITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineProperty {
    /// Type-check arguments on every call, not only for multi-arity groups.
    StrictTypeChecks,
    /// Convert panics in native code into `NativeException`.
    CatchNativePanics,
    /// Wrap value types by reference when they have no host binding.
    ValueTypeFallback,
    /// Give value types the record binding unless the host binds them.
    DefaultRecordBinding,
    /// Largest number of arguments an overload may declare.
    MaxArity,
}

impl EngineProperty {
    pub const ALL: [EngineProperty; 5] = [
        EngineProperty::StrictTypeChecks,
        EngineProperty::CatchNativePanics,
        EngineProperty::ValueTypeFallback,
        EngineProperty::DefaultRecordBinding,
        EngineProperty::MaxArity,
    ];

    pub fn default_value(&self) -> usize {
        match self {
            EngineProperty::StrictTypeChecks => 0,
            EngineProperty::CatchNativePanics => 1,
            EngineProperty::ValueTypeFallback => 1,
            EngineProperty::DefaultRecordBinding => 1,
            EngineProperty::MaxArity => DEFAULT_MAX_ARITY,
        }
    }
}

/// Property values the engine is initialized with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    properties: FxHashMap<EngineProperty, usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        let properties = EngineProperty::ALL
            .iter()
            .map(|&p| (p, p.default_value()))
            .collect();
        Self { properties }
    }

    pub fn set_property(&mut self, property: EngineProperty, value: usize) {
        self.properties.insert(property, value);
    }

    pub fn get_property(&self, property: EngineProperty) -> usize {
        self.properties
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    /// Builder form of [`set_property`](Self::set_property).
    pub fn with(mut self, property: EngineProperty, value: usize) -> Self {
        self.set_property(property, value);
        self
    }

    fn flag(&self, property: EngineProperty) -> bool {
        self.get_property(property) != 0
    }

    pub fn strict_type_checks(&self) -> bool {
        self.flag(EngineProperty::StrictTypeChecks)
    }

    pub fn catch_native_panics(&self) -> bool {
        self.flag(EngineProperty::CatchNativePanics)
    }

    pub fn value_type_fallback(&self) -> bool {
        self.flag(EngineProperty::ValueTypeFallback)
    }

    pub fn default_record_binding(&self) -> bool {
        self.flag(EngineProperty::DefaultRecordBinding)
    }

    pub fn max_arity(&self) -> usize {
        self.get_property(EngineProperty::MaxArity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert!(!config.strict_type_checks());
        assert!(config.catch_native_panics());
        assert!(config.value_type_fallback());
        assert!(config.default_record_binding());
        assert_eq!(config.max_arity(), DEFAULT_MAX_ARITY);
    }

    #[test]
    fn set_and_get() {
        let mut config = EngineConfig::default();
        config.set_property(EngineProperty::StrictTypeChecks, 1);
        assert!(config.strict_type_checks());
        let config = config.with(EngineProperty::MaxArity, 4);
        assert_eq!(config.get_property(EngineProperty::MaxArity), 4);
    }
}
