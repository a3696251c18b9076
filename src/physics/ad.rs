//! Physics objects whose Jacobians are obtained by forward-mode automatic differentiation.
use crate::dual::{Dual, Number};
use crate::physics::{FieldsAtQp, IntegralKind, PhysicsObject, QpContext};
use crate::variable::VariableId;
use crate::Real;
use davenport::{define_thread_local_workspace, with_thread_local_workspace};
use nalgebra::Vector2;

define_thread_local_workspace!(AD_WORKSPACE);

/// A residual integrand written once for any [`Number`] type.
///
/// Wrap it in an [`AdPhysicsObject`] to obtain a [`PhysicsObject`] whose on- and off-diagonal
/// Jacobian entries are exact derivatives of the residual.
pub trait AdKernel<T: Real>: Send + Sync {
    fn type_name(&self) -> &str;

    fn name(&self) -> &str;

    fn variable(&self) -> VariableId;

    fn coupled_variables(&self) -> &[VariableId] {
        &[]
    }

    fn integral_kind(&self) -> IntegralKind {
        IntegralKind::Volume
    }

    fn compute_qp_residual<N: Number<T>>(&self, context: &QpContext<T, N>) -> eyre::Result<N>;
}

#[derive(Debug, Clone)]
pub struct AdPhysicsObject<K> {
    kernel: K,
}

impl<K> AdPhysicsObject<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<K> AdPhysicsObject<K> {
    /// Evaluates the kernel with the field of `seed` perturbed in the direction of the trial
    /// function and returns the directional derivative.
    fn evaluate_seeded<T>(&self, context: &QpContext<T>, seed: VariableId) -> eyre::Result<T>
    where
        T: Real,
        K: AdKernel<T>,
    {
        if !context.has_field(seed) {
            return Ok(T::zero());
        }

        with_thread_local_workspace(&AD_WORKSPACE, |fields: &mut FieldsAtQp<Dual<T>>| {
            let plain = context.fields;
            fields.clear(plain.present.len());
            for (i, &present) in plain.present.iter().enumerate() {
                if present {
                    fields.set(
                        VariableId(i),
                        Dual::constant(plain.values[i]),
                        Dual::constant(plain.neighbor_values[i]),
                        plain.gradients[i].map(Dual::constant),
                    );
                }
            }

            let trial = &context.trial;
            let s = seed.index();
            fields.values[s].derivative = trial.value;
            fields.neighbor_values[s].derivative = trial.neighbor_value;
            fields.gradients[s] = Vector2::new(
                Dual::new(plain.gradients[s].x, trial.gradient.x),
                Dual::new(plain.gradients[s].y, trial.gradient.y),
            );

            let dual_context = QpContext {
                element: context.element,
                qp: context.qp,
                x: context.x,
                jxw: context.jxw,
                test: context.test,
                trial: context.trial,
                fields: &*fields,
            };
            let residual = self.kernel.compute_qp_residual(&dual_context)?;
            Ok(residual.derivative)
        })
    }
}

impl<T, K> PhysicsObject<T> for AdPhysicsObject<K>
where
    T: Real,
    K: AdKernel<T>,
{
    fn type_name(&self) -> &str {
        self.kernel.type_name()
    }

    fn name(&self) -> &str {
        self.kernel.name()
    }

    fn variable(&self) -> VariableId {
        self.kernel.variable()
    }

    fn coupled_variables(&self) -> &[VariableId] {
        self.kernel.coupled_variables()
    }

    fn integral_kind(&self) -> IntegralKind {
        self.kernel.integral_kind()
    }

    fn compute_qp_residual(&self, context: &QpContext<T>) -> eyre::Result<T> {
        self.kernel.compute_qp_residual(context)
    }

    fn compute_qp_jacobian(&self, context: &QpContext<T>) -> eyre::Result<T> {
        self.evaluate_seeded(context, self.kernel.variable())
    }

    fn compute_qp_off_diagonal_jacobian(&self, context: &QpContext<T>, jvar: VariableId) -> eyre::Result<T> {
        self.evaluate_seeded(context, jvar)
    }
}
