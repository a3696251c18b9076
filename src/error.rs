//! Error types reported by setup and assembly.
use crate::element::ElementKind;
use crate::variable::FeType;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Classification of failures.
///
/// Setup errors (`UnregisteredObjectKind`, `UnknownVariable`, `InvalidParameter`) are raised
/// before any assembly pass starts. The remaining kinds abort the pass in which they occur.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssemblyErrorKind {
    /// A variable was asked to live on an element type its family does not support.
    InvalidElementKind { element_kind: ElementKind, fe_type: FeType },
    /// A configuration references a physics object type that has not been registered.
    UnregisteredObjectKind { type_name: String },
    /// A configuration references a variable name that does not exist.
    UnknownVariable { name: String },
    /// A configuration is malformed (missing parameter, region mismatch, ...).
    InvalidParameter { message: String },
    /// An evaluation produced a non-finite value or failed an internal consistency check.
    NumericEvaluationFailure { message: String },
    /// A collaborator violated the assembly concurrency contract.
    ConcurrencyViolation { message: String },
}

impl Display for AssemblyErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidElementKind { element_kind, fe_type } => {
                write!(f, "{} variables are not supported on {:?} elements", fe_type, element_kind)
            }
            Self::UnregisteredObjectKind { type_name } => {
                write!(f, "no physics object type named '{}' has been registered", type_name)
            }
            Self::UnknownVariable { name } => write!(f, "unknown variable '{}'", name),
            Self::InvalidParameter { message } => write!(f, "invalid parameter: {}", message),
            Self::NumericEvaluationFailure { message } => write!(f, "numeric evaluation failure: {}", message),
            Self::ConcurrencyViolation { message } => write!(f, "concurrency violation: {}", message),
        }
    }
}

/// An error together with the identity of the offending element, object and quadrature point.
#[derive(Debug)]
pub struct AssemblyError {
    kind: AssemblyErrorKind,
    element: Option<usize>,
    object: Option<String>,
    variable: Option<String>,
    qp: Option<usize>,
    source: Option<eyre::Report>,
}

impl AssemblyError {
    pub fn new(kind: AssemblyErrorKind) -> Self {
        Self {
            kind,
            element: None,
            object: None,
            variable: None,
            qp: None,
            source: None,
        }
    }

    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::new(AssemblyErrorKind::UnknownVariable { name: name.into() })
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(AssemblyErrorKind::InvalidParameter {
            message: message.into(),
        })
    }

    pub fn numeric_failure(message: impl Into<String>) -> Self {
        Self::new(AssemblyErrorKind::NumericEvaluationFailure {
            message: message.into(),
        })
    }

    pub fn concurrency_violation(message: impl Into<String>) -> Self {
        Self::new(AssemblyErrorKind::ConcurrencyViolation {
            message: message.into(),
        })
    }

    pub fn with_element(mut self, element_index: usize) -> Self {
        self.element = Some(element_index);
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn with_qp(mut self, qp: usize) -> Self {
        self.qp = Some(qp);
        self
    }

    pub fn with_source(mut self, source: eyre::Report) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kind(&self) -> &AssemblyErrorKind {
        &self.kind
    }

    /// Index of the element being assembled when the error occurred.
    pub fn element(&self) -> Option<usize> {
        self.element
    }

    /// Identity of the physics object, formatted as `TypeName 'instance name'`.
    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    pub fn qp(&self) -> Option<usize> {
        self.qp
    }

    /// Whether the error was raised during setup, before any assembly pass.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self.kind,
            AssemblyErrorKind::UnregisteredObjectKind { .. }
                | AssemblyErrorKind::UnknownVariable { .. }
                | AssemblyErrorKind::InvalidParameter { .. }
        )
    }
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(element) = self.element {
            write!(f, " (element {}", element)?;
            if let Some(object) = &self.object {
                write!(f, ", object {}", object)?;
            }
            if let Some(variable) = &self.variable {
                write!(f, ", variable '{}'", variable)?;
            }
            if let Some(qp) = self.qp {
                write!(f, ", quadrature point {}", qp)?;
            }
            write!(f, ")")?;
        } else if let Some(object) = &self.object {
            write!(f, " (object {})", object)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|report| -> &(dyn Error + 'static) { report.as_ref() })
    }
}
