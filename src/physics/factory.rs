//! Construction of physics objects from configuration.
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::mesh::{BoundaryId, SubdomainId};
use crate::physics::{builtin, PhysicsObject};
use crate::variable::{VariableId, VariableSet};
use crate::Real;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Formatter;
use std::sync::Arc;

fn default_enabled() -> bool {
    true
}

/// Configuration of a single physics object, as it would appear in an input file.
///
/// ```json
/// {
///     "type": "CoupledForce",
///     "name": "source_from_v",
///     "variable": "u",
///     "coupled": { "v": "v" },
///     "params": { "coefficient": 2.0 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub variable: String,
    /// Coupling parameter name to variable name.
    #[serde(default)]
    pub coupled: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Subdomains a volume object is restricted to. All subdomains if absent.
    #[serde(default)]
    pub block: Option<Vec<SubdomainId>>,
    /// Boundaries (or interfaces) a facet object acts on.
    #[serde(default)]
    pub boundary: Option<Vec<BoundaryId>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ObjectConfig {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            variable: variable.into(),
            coupled: BTreeMap::new(),
            params: BTreeMap::new(),
            block: None,
            boundary: None,
            enabled: true,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_coupled(mut self, key: impl Into<String>, variable: impl Into<String>) -> Self {
        self.coupled.insert(key.into(), variable.into());
        self
    }

    pub fn with_block(mut self, subdomains: impl IntoIterator<Item = SubdomainId>) -> Self {
        self.block = Some(subdomains.into_iter().collect());
        self
    }

    pub fn with_boundary(mut self, boundaries: impl IntoIterator<Item = BoundaryId>) -> Self {
        self.boundary = Some(boundaries.into_iter().collect());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Identity used in diagnostics: `TypeName 'name'`.
    pub fn identity(&self) -> String {
        format!("{} '{}'", self.type_name, self.name)
    }
}

/// The view of a configuration handed to object constructors.
///
/// All variable names are resolved to [`VariableId`]s here, so that the constructed objects
/// never deal with names. Parameters that are never read by the constructor are reported as
/// errors once construction finishes.
pub struct ObjectBuildContext<'a> {
    config: &'a ObjectConfig,
    variables: &'a VariableSet,
    variable: VariableId,
    used_keys: RefCell<BTreeSet<&'a str>>,
}

impl<'a> ObjectBuildContext<'a> {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn type_name(&self) -> &str {
        &self.config.type_name
    }

    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn variables(&self) -> &VariableSet {
        self.variables
    }

    fn mark_used(&self, key: &str) {
        if let Some((stored_key, _)) = self.config.params.get_key_value(key) {
            self.used_keys.borrow_mut().insert(stored_key.as_str());
        }
        if let Some((stored_key, _)) = self.config.coupled.get_key_value(key) {
            self.used_keys.borrow_mut().insert(stored_key.as_str());
        }
    }

    /// A numeric parameter, or `default` if not given.
    pub fn param<T: Real>(&self, key: &str, default: f64) -> T {
        self.mark_used(key);
        let value = self.config.params.get(key).copied().unwrap_or(default);
        nalgebra::convert(value)
    }

    pub fn required_param<T: Real>(&self, key: &str) -> Result<T, AssemblyError> {
        self.mark_used(key);
        let value = self.config.params.get(key).copied().ok_or_else(|| {
            AssemblyError::invalid_parameter(format!("missing required parameter '{}'", key))
                .with_object(self.config.identity())
        })?;
        Ok(nalgebra::convert(value))
    }

    /// Resolves an optional coupling. Returns `None` if the configuration does not couple `key`.
    pub fn coupled(&self, key: &str) -> Result<Option<VariableId>, AssemblyError> {
        self.mark_used(key);
        self.config
            .coupled
            .get(key)
            .map(|name| {
                self.variables
                    .resolve(name)
                    .map_err(|err| err.with_object(self.config.identity()))
            })
            .transpose()
    }

    pub fn required_coupled(&self, key: &str) -> Result<VariableId, AssemblyError> {
        self.coupled(key)?.ok_or_else(|| {
            AssemblyError::invalid_parameter(format!("missing required coupled variable '{}'", key))
                .with_object(self.config.identity())
        })
    }

    fn unused_keys(&self) -> Vec<&'a str> {
        let used = self.used_keys.borrow();
        self.config
            .params
            .keys()
            .chain(self.config.coupled.keys())
            .map(String::as_str)
            .filter(|key| !used.contains(key))
            .collect()
    }
}

pub type ObjectConstructor<T> =
    Box<dyn Fn(&ObjectBuildContext) -> Result<Arc<dyn PhysicsObject<T>>, AssemblyError> + Send + Sync>;

/// An open registry mapping type names to physics object constructors.
pub struct ObjectFactory<T: Real> {
    constructors: FxHashMap<String, ObjectConstructor<T>>,
}

impl<T: Real> fmt::Debug for ObjectFactory<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}

impl<T: Real> Default for ObjectFactory<T> {
    fn default() -> Self {
        Self {
            constructors: FxHashMap::default(),
        }
    }
}

impl<T: Real> ObjectFactory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with all the physics objects provided by this crate registered.
    pub fn with_builtin_objects() -> Self {
        let mut factory = Self::new();
        builtin::register_builtin_objects(&mut factory);
        factory
    }

    /// Registers a constructor under the given type name, replacing any previous registration.
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectBuildContext) -> Result<Arc<dyn PhysicsObject<T>>, AssemblyError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.into(), Box::new(constructor));
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn create(
        &self,
        config: &ObjectConfig,
        variables: &VariableSet,
    ) -> Result<Arc<dyn PhysicsObject<T>>, AssemblyError> {
        let constructor = self.constructors.get(&config.type_name).ok_or_else(|| {
            AssemblyError::new(AssemblyErrorKind::UnregisteredObjectKind {
                type_name: config.type_name.clone(),
            })
            .with_object(config.identity())
        })?;
        let variable = variables
            .resolve(&config.variable)
            .map_err(|err| err.with_object(config.identity()))?;

        let context = ObjectBuildContext {
            config,
            variables,
            variable,
            used_keys: RefCell::new(BTreeSet::new()),
        };
        let object = constructor(&context)?;

        let unused = context.unused_keys();
        if !unused.is_empty() {
            return Err(AssemblyError::invalid_parameter(format!(
                "unrecognized parameters: {}",
                unused.join(", ")
            ))
            .with_object(config.identity()));
        }
        Ok(object)
    }
}
