use super::{Environment, InputTemplate, WorkflowError};

/// Who provides a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Written per unit by the stage.
    Substituted,
    /// Must be present in the input template.
    Required,
    /// Read from the input template when present.
    Optional,
}

/// One declared input key of a stage, without its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    name: &'static str,
    kind: FieldKind,
}

impl Field {
    /// Field the stage writes per unit.
    pub const fn substituted(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Substituted,
        }
    }

    /// Field the template must carry.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Required,
        }
    }

    /// Field the template may carry.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Optional,
        }
    }

    /// Bare key name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value provenance.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// The fixed key set a stage reads from or writes into its inputs.
///
/// Stages declare their fields as constants and address inputs only through
/// them, so an undeclared key is a compile error rather than a silent new
/// entry in the emitted JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionContract {
    namespace: &'static str,
    fields: &'static [Field],
}

impl SubstitutionContract {
    /// Contract for workflow `namespace` (`Mapping`, `JointGenotype`, ...).
    pub const fn new(namespace: &'static str, fields: &'static [Field]) -> Self {
        Self { namespace, fields }
    }

    /// Workflow namespace.
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Declared fields.
    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Key of `field` in the inputs JSON of `environment`.
    pub fn key(&self, field: &Field, environment: Environment) -> String {
        debug_assert!(
            self.fields.contains(field),
            "field {} is not declared by the {} contract",
            field.name,
            self.namespace
        );
        if environment.namespaced_keys() {
            format!("{}.{}", self.namespace, field.name)
        } else {
            field.name.to_string()
        }
    }

    /// Check the template carries every required field.
    pub fn validate(
        &self,
        template: &InputTemplate,
        environment: Environment,
    ) -> Result<(), WorkflowError> {
        for field in self.fields.iter().filter(|f| f.kind == FieldKind::Required) {
            let key = self.key(field, environment);
            if !template.contains(&key) {
                return Err(template.missing(&key));
            }
        }
        Ok(())
    }
}
