use crate::error::AssemblyError;
use crate::mesh::{BoundaryId, Element, ElementRole, SubdomainId};
use crate::physics::factory::{ObjectConfig, ObjectFactory};
use crate::physics::{object_identity, IntegralKind, PhysicsObject};
use crate::variable::{VariableId, VariableSet};
use crate::Real;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Formatter;
use std::sync::Arc;

/// The region an element belongs to, as seen by physics objects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Subdomain(SubdomainId),
    Boundary(BoundaryId),
    Interface(BoundaryId),
}

impl Region {
    pub fn of_element(element: &Element) -> Self {
        match element.role() {
            ElementRole::Volume => Self::Subdomain(element.subdomain()),
            ElementRole::Boundary(id) => Self::Boundary(id),
            ElementRole::Interface { boundary, .. } => Self::Interface(boundary),
        }
    }
}

/// Where a registered object applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// Every region matching the object's integral kind.
    Everywhere,
    Subdomains(BTreeSet<SubdomainId>),
    Boundaries(BTreeSet<BoundaryId>),
}

struct Entry<T: Real> {
    object: Arc<dyn PhysicsObject<T>>,
    restriction: Restriction,
    enabled: bool,
}

impl<T: Real> Entry<T> {
    fn applies_to(&self, region: Region) -> bool {
        use IntegralKind::*;
        let id = match (self.object.integral_kind(), region) {
            (Volume, Region::Subdomain(id)) => id,
            (Boundary, Region::Boundary(id)) => id,
            (Interface, Region::Interface(id)) => id,
            _ => return false,
        };
        match &self.restriction {
            Restriction::Everywhere => true,
            Restriction::Subdomains(ids) | Restriction::Boundaries(ids) => ids.contains(&id),
        }
    }
}

/// The physics objects of a problem, grouped by the variable whose equation they contribute to.
///
/// Lookups return objects in registration order, which makes the summation order within an
/// element reproducible. The registry is read-only during assembly; enabling or disabling
/// objects requires exclusive access and therefore can only happen between passes.
pub struct Registry<T: Real> {
    entries: Vec<Entry<T>>,
    by_variable: Vec<Vec<usize>>,
}

impl<T: Real> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let objects: Vec<_> = self
            .entries
            .iter()
            .map(|entry| object_identity(entry.object.as_ref()))
            .collect();
        f.debug_struct("Registry").field("objects", &objects).finish()
    }
}

impl<T: Real> Registry<T> {
    pub fn new(num_variables: usize) -> Self {
        Self {
            entries: Vec::new(),
            by_variable: vec![Vec::new(); num_variables],
        }
    }

    /// Resolves and constructs all configured objects.
    ///
    /// All configuration errors (unregistered types, unknown variables, bad parameters or
    /// restrictions) are reported here, before any assembly takes place.
    pub fn build(
        factory: &ObjectFactory<T>,
        configs: &[ObjectConfig],
        variables: &VariableSet,
    ) -> Result<Self, AssemblyError> {
        let mut registry = Self::new(variables.len());
        let mut names = BTreeSet::new();
        for config in configs {
            if !names.insert(config.name.as_str()) {
                return Err(AssemblyError::invalid_parameter(format!(
                    "object name '{}' is used more than once",
                    config.name
                )));
            }
            let object = factory.create(config, variables)?;
            let restriction = restriction_from_config(config, object.integral_kind())?;
            registry.add(object, restriction)?;
            if !config.enabled {
                registry.set_enabled(&config.name, false)?;
            }
        }
        log::info!(
            "Built physics registry with {} objects for {} variables",
            registry.entries.len(),
            variables.len()
        );
        Ok(registry)
    }

    pub fn add(&mut self, object: Arc<dyn PhysicsObject<T>>, restriction: Restriction) -> Result<(), AssemblyError> {
        let variable = object.variable().index();
        if variable >= self.by_variable.len() {
            return Err(AssemblyError::unknown_variable(format!("#{}", variable))
                .with_object(object_identity(object.as_ref())));
        }
        if let Some(&coupled) = object
            .coupled_variables()
            .iter()
            .find(|v| v.index() >= self.by_variable.len())
        {
            return Err(AssemblyError::unknown_variable(format!("#{}", coupled.index()))
                .with_object(object_identity(object.as_ref())));
        }
        check_restriction(&restriction, object.integral_kind())
            .map_err(|err| err.with_object(object_identity(object.as_ref())))?;

        self.by_variable[variable].push(self.entries.len());
        self.entries.push(Entry {
            object,
            restriction,
            enabled: true,
        });
        Ok(())
    }

    /// The enabled objects contributing to the equation of `variable` in `region`, in stable order.
    pub fn objects_for(
        &self,
        variable: VariableId,
        region: Region,
    ) -> impl Iterator<Item = &Arc<dyn PhysicsObject<T>>> + '_ {
        self.by_variable
            .get(variable.index())
            .into_iter()
            .flatten()
            .map(move |&index| &self.entries[index])
            .filter(move |entry| entry.enabled && entry.applies_to(region))
            .map(|entry| &entry.object)
    }

    /// Enables or disables the object with the given instance name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), AssemblyError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.object.name() == name)
            .ok_or_else(|| AssemblyError::invalid_parameter(format!("no object named '{}'", name)))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|entry| entry.object.name() == name)
            .map(|entry| entry.enabled)
    }

    pub fn num_objects(&self) -> usize {
        self.entries.len()
    }

    pub fn num_variables(&self) -> usize {
        self.by_variable.len()
    }

    /// All registered objects in registration order, enabled or not.
    pub fn objects(&self) -> impl Iterator<Item = &Arc<dyn PhysicsObject<T>>> {
        self.entries.iter().map(|entry| &entry.object)
    }
}

fn check_restriction(restriction: &Restriction, kind: IntegralKind) -> Result<(), AssemblyError> {
    match (kind, restriction) {
        (IntegralKind::Volume, Restriction::Boundaries(_)) => Err(AssemblyError::invalid_parameter(
            "volume objects cannot be restricted to boundaries",
        )),
        (IntegralKind::Boundary | IntegralKind::Interface, Restriction::Subdomains(_)) => Err(
            AssemblyError::invalid_parameter("facet objects must be restricted to boundaries, not blocks"),
        ),
        (IntegralKind::Boundary | IntegralKind::Interface, Restriction::Everywhere) => Err(
            AssemblyError::invalid_parameter("facet objects require a boundary restriction"),
        ),
        _ => Ok(()),
    }
}

fn restriction_from_config(config: &ObjectConfig, kind: IntegralKind) -> Result<Restriction, AssemblyError> {
    let restriction = match (&config.block, &config.boundary) {
        (Some(_), Some(_)) => {
            return Err(AssemblyError::invalid_parameter("cannot restrict to both blocks and boundaries")
                .with_object(config.identity()))
        }
        (Some(block), None) => Restriction::Subdomains(block.iter().copied().collect()),
        (None, Some(boundary)) => Restriction::Boundaries(boundary.iter().copied().collect()),
        (None, None) => Restriction::Everywhere,
    };
    check_restriction(&restriction, kind).map_err(|err| err.with_object(config.identity()))?;
    Ok(restriction)
}
