//! Solution variables and their finite element types.
use crate::element::ElementKind;
use crate::error::AssemblyError;
use crate::mesh::SubdomainId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Index of a variable in its [`VariableSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub usize);

impl VariableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeFamily {
    /// Continuous nodal basis.
    Lagrange,
    /// Discontinuous element-wise polynomials.
    Monomial,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeOrder {
    Constant,
    First,
    Second,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeType {
    pub family: FeFamily,
    pub order: FeOrder,
}

impl FeType {
    pub const LAGRANGE_FIRST: Self = Self {
        family: FeFamily::Lagrange,
        order: FeOrder::First,
    };
    pub const LAGRANGE_SECOND: Self = Self {
        family: FeFamily::Lagrange,
        order: FeOrder::Second,
    };
    pub const MONOMIAL_CONSTANT: Self = Self {
        family: FeFamily::Monomial,
        order: FeOrder::Constant,
    };

    /// Number of local shape functions on an element of the given kind, or `None` if the
    /// type is not supported there.
    ///
    /// On interface facets, discontinuous types have one set of shapes per side: the shapes
    /// of the first neighbor come first.
    pub fn shape_count(&self, kind: ElementKind, is_interface: bool) -> Option<usize> {
        use ElementKind::*;
        use FeFamily::*;
        use FeOrder::*;
        match (self.family, self.order, kind) {
            (Lagrange, First, Segment2) => Some(2),
            (Lagrange, First, Tri3 | Tri6) => Some(3),
            (Lagrange, First, Quad4) => Some(4),
            (Lagrange, Second, Tri6) => Some(6),
            (Monomial, Constant, Segment2) if is_interface => Some(2),
            (Monomial, Constant, Tri3 | Tri6 | Quad4) => Some(1),
            _ => None,
        }
    }
}

impl Display for FeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            FeOrder::Constant => "constant",
            FeOrder::First => "first order",
            FeOrder::Second => "second order",
        };
        let family = match self.family {
            FeFamily::Lagrange => "Lagrange",
            FeFamily::Monomial => "monomial",
        };
        write!(f, "{} {}", order, family)
    }
}

fn default_scaling() -> f64 {
    1.0
}

/// A scalar solution field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    fe_type: FeType,
    /// Subdomains on which the variable lives. `None` means everywhere.
    #[serde(default)]
    subdomains: Option<BTreeSet<SubdomainId>>,
    /// Factor applied to every residual and Jacobian row of this variable.
    #[serde(default = "default_scaling")]
    scaling: f64,
}

impl Variable {
    pub fn new(name: impl Into<String>, fe_type: FeType) -> Self {
        Self {
            name: name.into(),
            fe_type,
            subdomains: None,
            scaling: 1.0,
        }
    }

    pub fn with_subdomains(mut self, subdomains: impl IntoIterator<Item = SubdomainId>) -> Self {
        self.subdomains = Some(subdomains.into_iter().collect());
        self
    }

    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fe_type(&self) -> FeType {
        self.fe_type
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    pub fn is_active_on(&self, subdomain: SubdomainId) -> bool {
        self.subdomains
            .as_ref()
            .map(|subdomains| subdomains.contains(&subdomain))
            .unwrap_or(true)
    }
}

/// The variables of a problem. The [`VariableId`] of a variable is its insertion index.
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    variables: Vec<Variable>,
    ids_by_name: FxHashMap<String, VariableId>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Result<Self, AssemblyError> {
        let mut set = Self::new();
        for variable in variables {
            set.add(variable)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, variable: Variable) -> Result<VariableId, AssemblyError> {
        if self.ids_by_name.contains_key(variable.name()) {
            return Err(AssemblyError::invalid_parameter(format!(
                "variable '{}' is defined more than once",
                variable.name()
            )));
        }
        if !(variable.scaling.is_finite() && variable.scaling != 0.0) {
            return Err(AssemblyError::invalid_parameter(format!(
                "variable '{}' has invalid scaling {}",
                variable.name(),
                variable.scaling
            )));
        }
        let id = VariableId(self.variables.len());
        self.ids_by_name.insert(variable.name.clone(), id);
        self.variables.push(variable);
        Ok(id)
    }

    /// Looks up a variable by name.
    pub fn resolve(&self, name: &str) -> Result<VariableId, AssemblyError> {
        self.ids_by_name
            .get(name)
            .copied()
            .ok_or_else(|| AssemblyError::unknown_variable(name))
    }

    pub fn get(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        (0..self.variables.len()).map(VariableId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter().enumerate().map(|(i, v)| (VariableId(i), v))
    }

    pub fn is_active(&self, id: VariableId, subdomain: SubdomainId) -> bool {
        self.get(id).is_active_on(subdomain)
    }

    /// The distinct finite element types in use, in order of first appearance.
    pub fn fe_types(&self) -> Vec<FeType> {
        let mut types = Vec::new();
        for variable in &self.variables {
            if !types.contains(&variable.fe_type) {
                types.push(variable.fe_type);
            }
        }
        types
    }
}
