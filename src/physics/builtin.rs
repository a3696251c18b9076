//! Physics objects shipped with the crate.
//!
//! Sign convention: residuals are written as `R(u) = 0`, so sources enter with a negative sign.
use crate::dual::Number;
use crate::error::AssemblyError;
use crate::physics::factory::ObjectFactory;
use crate::physics::{AdKernel, AdPhysicsObject, IntegralKind, PhysicsObject, QpContext};
use crate::variable::VariableId;
use crate::Real;
use std::sync::Arc;

pub(crate) fn register_builtin_objects<T: Real>(factory: &mut ObjectFactory<T>) {
    factory.register("Diffusion", |ctx| {
        Ok(Arc::new(Diffusion {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            coefficient: ctx.param::<T>("coefficient", 1.0),
        }))
    });
    factory.register("BodyForce", |ctx| {
        Ok(Arc::new(BodyForce {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            value: ctx.param::<T>("value", 1.0),
        }))
    });
    factory.register("CoupledForce", |ctx| {
        Ok(Arc::new(CoupledForce {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            coupled: [ctx.required_coupled("v")?],
            coefficient: ctx.param::<T>("coefficient", 1.0),
        }))
    });
    factory.register("Reaction", |ctx| {
        Ok(Arc::new(Reaction {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            rate: ctx.param::<T>("rate", 1.0),
        }))
    });
    factory.register("NonlinearDiffusion", |ctx| {
        let temperature = ctx.coupled("temperature")?;
        let kernel = NonlinearDiffusion {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            coupled: temperature.into_iter().collect(),
            temperature,
            k0: ctx.param::<T>("k0", 1.0),
            alpha: ctx.param::<T>("alpha", 0.0),
            beta: ctx.param::<T>("beta", 0.0),
        };
        Ok(Arc::new(AdPhysicsObject::new(kernel)))
    });
    factory.register("NeumannFlux", |ctx| {
        Ok(Arc::new(NeumannFlux {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            value: ctx.param::<T>("value", 0.0),
        }))
    });
    factory.register("PenaltyDirichlet", |ctx| {
        Ok(Arc::new(PenaltyDirichlet {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            value: ctx.param::<T>("value", 0.0),
            penalty: positive_param(ctx.required_param::<T>("penalty")?, "penalty", ctx.name())?,
        }))
    });
    factory.register("JumpPenalty", |ctx| {
        Ok(Arc::new(JumpPenalty {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            penalty: positive_param(ctx.required_param::<T>("penalty")?, "penalty", ctx.name())?,
        }))
    });
}

fn positive_param<T: Real>(value: T, key: &str, object: &str) -> Result<T, AssemblyError> {
    if value > T::zero() {
        Ok(value)
    } else {
        Err(AssemblyError::invalid_parameter(format!("'{}' must be positive", key)).with_object(object))
    }
}

/// `k grad u . grad v`
#[derive(Debug, Clone)]
pub struct Diffusion<T> {
    pub name: String,
    pub variable: VariableId,
    pub coefficient: T,
}

impl<T: Real> PhysicsObject<T> for Diffusion<T> {
    fn type_name(&self) -> &str {
        "Diffusion"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        let grad_u = context.gradient(self.variable);
        Ok(grad_u.dot(&context.test.gradient) * self.coefficient)
    }

    fn compute_qp_jacobian(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(context.trial.gradient.dot(&context.test.gradient) * self.coefficient)
    }
}

/// `-f v` for a constant source `f`.
#[derive(Debug, Clone)]
pub struct BodyForce<T> {
    pub name: String,
    pub variable: VariableId,
    pub value: T,
}

impl<T: Real> PhysicsObject<T> for BodyForce<T> {
    fn type_name(&self) -> &str {
        "BodyForce"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(-self.value * context.test.value)
    }
}

/// `-c w v` where `w` is another variable.
#[derive(Debug, Clone)]
pub struct CoupledForce<T> {
    pub name: String,
    pub variable: VariableId,
    pub coupled: [VariableId; 1],
    pub coefficient: T,
}

impl<T: Real> PhysicsObject<T> for CoupledForce<T> {
    fn type_name(&self) -> &str {
        "CoupledForce"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn coupled_variables(&self) -> &[VariableId] {
        &self.coupled
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        let w = context.coupled_value_or(Some(self.coupled[0]), T::zero());
        Ok(-self.coefficient * w * context.test.value)
    }

    fn compute_qp_off_diagonal_jacobian(&self, context: &QpContext<T>, jvar: VariableId) -> eyre::Result<T> {
        if jvar == self.coupled[0] {
            Ok(-self.coefficient * context.trial.value * context.test.value)
        } else {
            Ok(T::zero())
        }
    }
}

/// `r u v`
#[derive(Debug, Clone)]
pub struct Reaction<T> {
    pub name: String,
    pub variable: VariableId,
    pub rate: T,
}

impl<T: Real> PhysicsObject<T> for Reaction<T> {
    fn type_name(&self) -> &str {
        "Reaction"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(self.rate * context.value(self.variable) * context.test.value)
    }

    fn compute_qp_jacobian(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(self.rate * context.trial.value * context.test.value)
    }
}

/// `k(u, T) grad u . grad v` with `k(u, T) = k0 (1 + alpha u^2) (1 + beta T)`.
///
/// The temperature coupling is optional; without it (or where the temperature is not active)
/// the last factor is one.
#[derive(Debug, Clone)]
pub struct NonlinearDiffusion<T> {
    pub name: String,
    pub variable: VariableId,
    pub temperature: Option<VariableId>,
    pub coupled: Vec<VariableId>,
    pub k0: T,
    pub alpha: T,
    pub beta: T,
}

impl<T: Real> AdKernel<T> for NonlinearDiffusion<T> {
    fn type_name(&self) -> &str {
        "NonlinearDiffusion"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn coupled_variables(&self) -> &[VariableId] {
        &self.coupled
    }

    fn compute_qp_residual<N: Number<T>>(&self, context: &QpContext<T, N>) -> eyre::Result<N> {
        let u = context.value(self.variable);
        let temperature = context.coupled_value_or(self.temperature, T::zero());
        let k = (u.powi(2) * self.alpha + T::one()) * (temperature * self.beta + T::one()) * self.k0;
        let grad_u = context.gradient(self.variable);
        Ok(grad_u.dot(&context.test_gradient()) * k)
    }
}

/// `-g v` on boundary facets, for a prescribed outward flux `g`.
#[derive(Debug, Clone)]
pub struct NeumannFlux<T> {
    pub name: String,
    pub variable: VariableId,
    pub value: T,
}

impl<T: Real> PhysicsObject<T> for NeumannFlux<T> {
    fn type_name(&self) -> &str {
        "NeumannFlux"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn integral_kind(&self) -> IntegralKind {
        IntegralKind::Boundary
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(-self.value * context.test.value)
    }
}

/// `p (u - g) v` on boundary facets, weakly enforcing `u = g`.
#[derive(Debug, Clone)]
pub struct PenaltyDirichlet<T> {
    pub name: String,
    pub variable: VariableId,
    pub value: T,
    pub penalty: T,
}

impl<T: Real> PhysicsObject<T> for PenaltyDirichlet<T> {
    fn type_name(&self) -> &str {
        "PenaltyDirichlet"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn integral_kind(&self) -> IntegralKind {
        IntegralKind::Boundary
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        let u = context.value(self.variable);
        Ok(self.penalty * (u - self.value) * context.test.value)
    }

    fn compute_qp_jacobian(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(self.penalty * context.trial.value * context.test.value)
    }
}

/// `p [u] [v]` on interface facets, where `[.]` is the jump across the interface.
#[derive(Debug, Clone)]
pub struct JumpPenalty<T> {
    pub name: String,
    pub variable: VariableId,
    pub penalty: T,
}

impl<T: Real> PhysicsObject<T> for JumpPenalty<T> {
    fn type_name(&self) -> &str {
        "JumpPenalty"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variable(&self) -> VariableId {
        self.variable
    }

    fn integral_kind(&self) -> IntegralKind {
        IntegralKind::Interface
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        let jump = context.value(self.variable) - context.neighbor_value(self.variable);
        Ok(self.penalty * jump * context.test.jump())
    }

    fn compute_qp_jacobian(&self, context: &QpContext<T>) -> eyre::Result<T> {
        Ok(self.penalty * context.trial.jump() * context.test.jump())
    }
}
