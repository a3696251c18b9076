use crate::dofs::DofMap;
use crate::element::{evaluate_element_map, populate_linear_basis, populate_tri6_basis, ElementKind};
use crate::error::AssemblyError;
use crate::mesh::{ElementRole, Mesh};
use crate::physics::{FieldsAtQp, QpContext, Shape};
use crate::quadrature::{element_quadrature, QuadraturePair, QuadratureOrder};
use crate::variable::{FeFamily, FeOrder, FeType, VariableId};
use crate::Real;
use nalgebra::{Matrix2, Point2, Vector2};

/// Shape functions of one finite element type at all quadrature points of the current element.
#[derive(Debug, Clone)]
struct ShapeTable<T: Real> {
    /// Number of shape functions, or `None` if the type is not supported on the element.
    count: Option<usize>,
    /// Stored quadrature point by quadrature point.
    shapes: Vec<Shape<T>>,
}

impl<T: Real> Default for ShapeTable<T> {
    fn default() -> Self {
        Self {
            count: None,
            shapes: Vec::new(),
        }
    }
}

/// Per-worker cache of quadrature and shape function data for the element being assembled.
///
/// After [`reinit`](Self::reinit), the context holds quadrature weights premultiplied with the
/// mapping determinant (`JxW`), physical quadrature points and, for every finite element type in
/// use, shape function values and physical gradients. Solution fields are gathered separately
/// with [`gather_field`](Self::gather_field).
///
/// Accessors panic on out-of-range indices.
#[derive(Debug)]
pub struct QuadratureContext<T: Real> {
    order: QuadratureOrder,
    fe_types: Vec<FeType>,
    /// Index into `fe_types` for every variable.
    variable_fe_slots: Vec<usize>,
    rules: Vec<(ElementKind, QuadraturePair<T>)>,

    element: Option<usize>,
    kind: ElementKind,
    num_qp: usize,
    vertices: Vec<Point2<T>>,
    points: Vec<Point2<T>>,
    jxw: Vec<T>,
    inverse_transposes: Vec<Matrix2<T>>,
    tables: Vec<ShapeTable<T>>,
    fields: Vec<FieldsAtQp<T>>,
}

impl<T: Real> QuadratureContext<T> {
    pub fn new(dof_map: &DofMap, order: QuadratureOrder) -> Self {
        let mut context = Self {
            order,
            fe_types: Vec::new(),
            variable_fe_slots: Vec::new(),
            rules: Vec::new(),
            element: None,
            kind: ElementKind::Tri3,
            num_qp: 0,
            vertices: Vec::new(),
            points: Vec::new(),
            jxw: Vec::new(),
            inverse_transposes: Vec::new(),
            tables: Vec::new(),
            fields: Vec::new(),
        };
        context.prepare(dof_map, order);
        context
    }

    /// Adapts the context to the variables of `dof_map` and the given quadrature order,
    /// keeping allocations where possible. Invalidates the current element.
    pub fn prepare(&mut self, dof_map: &DofMap, order: QuadratureOrder) {
        if order != self.order {
            self.rules.clear();
            self.order = order;
        }
        self.fe_types.clear();
        self.variable_fe_slots.clear();
        for v in 0..dof_map.num_variables() {
            let fe_type = dof_map.variable(VariableId(v)).fe_type();
            let slot = match self.fe_types.iter().position(|t| *t == fe_type) {
                Some(slot) => slot,
                None => {
                    self.fe_types.push(fe_type);
                    self.fe_types.len() - 1
                }
            };
            self.variable_fe_slots.push(slot);
        }
        self.tables.resize_with(self.fe_types.len(), Default::default);
        self.element = None;
    }

    fn rule_index(&mut self, kind: ElementKind) -> usize {
        match self.rules.iter().position(|(k, _)| *k == kind) {
            Some(index) => index,
            None => {
                self.rules.push((kind, element_quadrature(kind, self.order)));
                self.rules.len() - 1
            }
        }
    }

    /// Computes all geometric and shape function data for the given element, discarding any
    /// data of the previous element (including gathered fields).
    pub fn reinit(&mut self, mesh: &Mesh<T>, element_index: usize) -> Result<(), AssemblyError> {
        self.element = None;
        let element = mesh.element(element_index);
        let kind = element.kind();
        let is_interface = matches!(element.role(), ElementRole::Interface { .. });
        mesh.populate_element_vertices(element_index, &mut self.vertices);

        let rule_index = self.rule_index(kind);
        let (weights, reference_points) = &self.rules[rule_index].1;
        let num_qp = weights.len();
        self.kind = kind;
        self.num_qp = num_qp;
        self.points.clear();
        self.jxw.clear();
        self.inverse_transposes.clear();

        for (q, (w, xi)) in weights.iter().zip(reference_points).enumerate() {
            let map = evaluate_element_map(kind, &self.vertices, xi).ok_or_else(|| {
                AssemblyError::numeric_failure("degenerate element geometry (non-positive mapping determinant)")
                    .with_element(element_index)
                    .with_qp(q)
            })?;
            self.points.push(map.x);
            self.jxw.push(*w * map.det);
            self.inverse_transposes.push(map.inverse_transpose);
        }

        for (fe_type, table) in self.fe_types.iter().zip(&mut self.tables) {
            table.shapes.clear();
            table.count = fe_type.shape_count(kind, is_interface);
            let Some(count) = table.count else { continue };
            for (xi, inverse_transpose) in reference_points.iter().zip(&self.inverse_transposes) {
                populate_shapes(*fe_type, kind, is_interface, xi, inverse_transpose, count, &mut table.shapes);
            }
        }

        let num_variables = self.variable_fe_slots.len();
        self.fields.resize_with(num_qp, Default::default);
        for fields in &mut self.fields {
            fields.clear(num_variables);
        }

        self.element = Some(element_index);
        Ok(())
    }

    /// Interpolates the solution of `variable` at all quadrature points from the coefficients
    /// of the given global dofs. Does nothing if `dofs` is empty.
    pub fn gather_field(&mut self, variable: VariableId, dofs: &[usize], solution: &[T]) {
        if dofs.is_empty() {
            return;
        }
        let count = self.num_shapes(variable).expect("Variable must be supported on element");
        assert_eq!(dofs.len(), count, "Number of dofs must match number of shape functions");
        let table = &self.tables[self.variable_fe_slots[variable.index()]];
        for (q, fields) in self.fields.iter_mut().enumerate() {
            let shapes = &table.shapes[q * count..(q + 1) * count];
            let mut value = T::zero();
            let mut neighbor_value = T::zero();
            let mut gradient = Vector2::zeros();
            for (shape, &dof) in shapes.iter().zip(dofs) {
                let u = solution[dof];
                value += shape.value * u;
                neighbor_value += shape.neighbor_value * u;
                gradient += shape.gradient * u;
            }
            fields.set(variable, value, neighbor_value, gradient);
        }
    }

    /// Index of the current element, if the context has been initialized.
    pub fn element(&self) -> Option<usize> {
        self.element
    }

    pub fn element_kind(&self) -> ElementKind {
        self.kind
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.num_qp
    }

    /// Quadrature weight times mapping determinant at quadrature point `q`.
    pub fn jxw(&self, q: usize) -> T {
        self.jxw[q]
    }

    pub fn jxw_all(&self) -> &[T] {
        &self.jxw
    }

    pub fn point(&self, q: usize) -> &Point2<T> {
        &self.points[q]
    }

    /// Number of local shape functions of `variable` on the current element, or `None` if its
    /// finite element type is not supported there.
    pub fn num_shapes(&self, variable: VariableId) -> Option<usize> {
        self.tables[self.variable_fe_slots[variable.index()]].count
    }

    /// The local shape functions of `variable` at quadrature point `q`.
    pub fn shapes(&self, variable: VariableId, q: usize) -> &[Shape<T>] {
        assert!(q < self.num_qp, "Quadrature point index out of bounds");
        let table = &self.tables[self.variable_fe_slots[variable.index()]];
        let count = table.count.expect("Variable must be supported on element");
        &table.shapes[q * count..(q + 1) * count]
    }

    pub fn shape(&self, variable: VariableId, q: usize, i: usize) -> &Shape<T> {
        &self.shapes(variable, q)[i]
    }

    /// The gathered solution fields at quadrature point `q`.
    pub fn fields(&self, q: usize) -> &FieldsAtQp<T> {
        &self.fields[q]
    }

    /// Builds the evaluation context handed to physics objects.
    pub fn qp_context(&self, q: usize, test: Shape<T>, trial: Shape<T>) -> QpContext<'_, T> {
        let element = self.element.expect("Context must be initialized with reinit");
        QpContext {
            element,
            qp: q,
            x: self.points[q],
            jxw: self.jxw[q],
            test,
            trial,
            fields: &self.fields[q],
        }
    }
}

/// Appends the shape functions of `fe_type` at the reference point `xi`.
fn populate_shapes<T: Real>(
    fe_type: FeType,
    kind: ElementKind,
    is_interface: bool,
    xi: &Point2<T>,
    inverse_transpose: &Matrix2<T>,
    count: usize,
    output: &mut Vec<Shape<T>>,
) {
    let mut values = [T::zero(); 6];
    let mut gradients = [Vector2::zeros(); 6];
    match (fe_type.family, fe_type.order) {
        (FeFamily::Lagrange, FeOrder::Second) => {
            populate_tri6_basis(xi, &mut values[..count], &mut gradients[..count])
        }
        (FeFamily::Lagrange, _) => populate_linear_basis(kind, xi, &mut values[..count], &mut gradients[..count]),
        (FeFamily::Monomial, _) => {
            if is_interface {
                // One constant per side: shape 0 lives on the first neighbor, shape 1 on the second
                output.push(Shape {
                    value: T::one(),
                    neighbor_value: T::zero(),
                    gradient: Vector2::zeros(),
                });
                output.push(Shape {
                    value: T::zero(),
                    neighbor_value: T::one(),
                    gradient: Vector2::zeros(),
                });
            } else {
                output.push(Shape {
                    value: T::one(),
                    neighbor_value: T::one(),
                    gradient: Vector2::zeros(),
                });
            }
            return;
        }
    }

    for (&value, reference_gradient) in values[..count].iter().zip(&gradients[..count]) {
        output.push(Shape {
            value,
            neighbor_value: value,
            gradient: inverse_transpose * reference_gradient,
        });
    }
}
