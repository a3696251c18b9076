//! Physics objects: the independently written terms that contribute to residuals and Jacobians.
//!
//! A physics object implements a single term of a weak form by evaluating its integrand at one
//! quadrature point for one test function (and, for Jacobians, one trial function). The assembly
//! engine takes care of integration, index mapping and scattering.
use crate::dual::Number;
use crate::variable::VariableId;
use crate::Real;
use nalgebra::{Point2, Vector2};

pub mod ad;
pub mod builtin;
pub mod factory;
pub mod registry;

pub use ad::{AdKernel, AdPhysicsObject};
pub use factory::{ObjectBuildContext, ObjectConfig, ObjectFactory};
pub use registry::{Region, Registry};

/// The kind of integral a physics object contributes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IntegralKind {
    /// Integrals over volume elements of a subdomain.
    Volume,
    /// Integrals over boundary facets.
    Boundary,
    /// Integrals over interface facets, with access to both sides.
    Interface,
}

/// A shape function evaluated at a quadrature point.
///
/// On interface facets, `value` is the value seen from the first neighbor and `neighbor_value`
/// the value seen from the second. For continuous shape functions and on all other elements
/// the two coincide.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Shape<T> {
    pub value: T,
    pub neighbor_value: T,
    /// Physical gradient (tangential derivative on facets).
    pub gradient: Vector2<T>,
}

impl<T: Real> Shape<T> {
    pub fn zero() -> Self {
        Self {
            value: T::zero(),
            neighbor_value: T::zero(),
            gradient: Vector2::zeros(),
        }
    }

    /// The jump `value - neighbor_value` across an interface.
    pub fn jump(&self) -> T {
        self.value - self.neighbor_value
    }
}

/// Interpolated solution fields at a single quadrature point, indexed by variable.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsAtQp<N> {
    pub(crate) present: Vec<bool>,
    pub(crate) values: Vec<N>,
    pub(crate) neighbor_values: Vec<N>,
    pub(crate) gradients: Vec<Vector2<N>>,
}

impl<N> Default for FieldsAtQp<N> {
    fn default() -> Self {
        Self {
            present: Vec::new(),
            values: Vec::new(),
            neighbor_values: Vec::new(),
            gradients: Vec::new(),
        }
    }
}

impl<N: nalgebra::Scalar + num::Zero> FieldsAtQp<N> {
    /// Resizes to hold `num_variables` fields and marks all of them absent.
    pub fn clear(&mut self, num_variables: usize) {
        self.present.clear();
        self.present.resize(num_variables, false);
        self.values.resize(num_variables, N::zero());
        self.neighbor_values.resize(num_variables, N::zero());
        self.gradients.resize(num_variables, Vector2::zeros());
    }

    pub fn set(&mut self, variable: VariableId, value: N, neighbor_value: N, gradient: Vector2<N>) {
        let i = variable.index();
        self.present[i] = true;
        self.values[i] = value;
        self.neighbor_values[i] = neighbor_value;
        self.gradients[i] = gradient;
    }

    pub fn is_present(&self, variable: VariableId) -> bool {
        self.present.get(variable.index()).copied().unwrap_or(false)
    }
}

/// Everything a physics object may inspect when evaluated at a quadrature point.
///
/// `N` is the number type of the solution fields. Plain objects see `N = T`; objects written
/// against [`AdKernel`] are also evaluated with dual numbers.
#[derive(Debug, Clone, Copy)]
pub struct QpContext<'a, T: Real, N = T> {
    pub element: usize,
    pub qp: usize,
    /// Physical coordinates of the quadrature point.
    pub x: Point2<T>,
    /// Quadrature weight times the mapping determinant.
    pub jxw: T,
    pub test: Shape<T>,
    /// The trial shape function. Zero when evaluating residuals.
    pub trial: Shape<T>,
    pub(crate) fields: &'a FieldsAtQp<N>,
}

impl<'a, T: Real, N: Number<T>> QpContext<'a, T, N> {
    pub fn has_field(&self, variable: VariableId) -> bool {
        self.fields.is_present(variable)
    }

    /// Value of `variable` at the quadrature point.
    ///
    /// Panics if the variable was not gathered for this element. Variables are gathered for the
    /// object's own variable and for every coupled variable active on the element.
    pub fn value(&self, variable: VariableId) -> N {
        assert!(self.has_field(variable), "Variable {:?} not available at quadrature point", variable);
        self.fields.values[variable.index()]
    }

    /// Value of `variable` seen from the second neighbor of an interface facet.
    pub fn neighbor_value(&self, variable: VariableId) -> N {
        assert!(self.has_field(variable), "Variable {:?} not available at quadrature point", variable);
        self.fields.neighbor_values[variable.index()]
    }

    pub fn gradient(&self, variable: VariableId) -> Vector2<N> {
        assert!(self.has_field(variable), "Variable {:?} not available at quadrature point", variable);
        self.fields.gradients[variable.index()]
    }

    /// Value of an optional coupling: `default` if the variable is not coupled or not active here.
    pub fn coupled_value_or(&self, variable: Option<VariableId>, default: T) -> N {
        match variable {
            Some(variable) if self.has_field(variable) => self.fields.values[variable.index()],
            _ => N::from_real(default),
        }
    }

    pub fn test_value(&self) -> N {
        N::from_real(self.test.value)
    }

    pub fn test_gradient(&self) -> Vector2<N> {
        self.test.gradient.map(N::from_real)
    }

    pub fn test_jump(&self) -> N {
        N::from_real(self.test.jump())
    }
}

/// A term of the weak form associated with one equation (its variable).
///
/// Implementations must be deterministic and free of side effects visible to other objects,
/// since they are evaluated concurrently from all worker threads.
pub trait PhysicsObject<T: Real>: Send + Sync {
    /// The registered type name, e.g. `"Diffusion"`.
    fn type_name(&self) -> &str;

    /// The instance name given in the configuration.
    fn name(&self) -> &str;

    /// The variable whose equation this object contributes to.
    fn variable(&self) -> VariableId;

    /// Variables the object depends on besides its own.
    fn coupled_variables(&self) -> &[VariableId] {
        &[]
    }

    fn integral_kind(&self) -> IntegralKind {
        IntegralKind::Volume
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T>;

    /// Derivative of the residual integrand with respect to the coefficient of `context.trial`
    /// in the object's own variable.
    fn compute_qp_jacobian(&self, _context: &QpContext<T>) -> eyre::Result<T> {
        Ok(T::zero())
    }

    /// Derivative of the residual integrand with respect to the coefficient of `context.trial`
    /// in the coupled variable `jvar`.
    fn compute_qp_off_diagonal_jacobian(&self, _context: &QpContext<T>, _jvar: VariableId) -> eyre::Result<T> {
        Ok(T::zero())
    }
}

impl<T: Real> std::fmt::Debug for dyn PhysicsObject<T> + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", object_identity(self))
    }
}

/// Identity used in diagnostics: `TypeName 'name'`.
pub fn object_identity<T: Real>(object: &dyn PhysicsObject<T>) -> String {
    format!("{} '{}'", object.type_name(), object.name())
}
