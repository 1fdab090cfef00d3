//! Form schemas for the payload each human step accepts.
//!
//! Validation runs before any payload is merged into the process, so the
//! merge code downstream can assume the fields it reads are present and
//! well-typed.

use serde_json::Value;

/// A payload field and the shape it must take.
#[derive(Debug, Clone, Copy)]
pub enum FieldSpec {
    /// Required string drawn from a fixed set of options.
    Choice {
        name: &'static str,
        options: &'static [&'static str],
    },
    /// Required integer score, 1 through 5.
    Score { name: &'static str },
    /// Free text; required text must be non-empty.
    Text { name: &'static str, required: bool },
    /// Required boolean.
    Flag { name: &'static str },
}

impl FieldSpec {
    const fn name(&self) -> &'static str {
        match self {
            Self::Choice { name, .. }
            | Self::Score { name }
            | Self::Text { name, .. }
            | Self::Flag { name } => name,
        }
    }

    const fn required(&self) -> bool {
        match self {
            Self::Text { required, .. } => *required,
            _ => true,
        }
    }
}

/// The full field set a step's completion payload must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct StepSchema {
    pub fields: &'static [FieldSpec],
}

/// A payload that does not satisfy its step's schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("payload is missing required field '{0}'")]
    Missing(String),
    #[error("payload carries unknown field '{0}'")]
    Unknown(String),
    #[error("field '{field}' must be a {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field '{field}' value '{value}' is not an allowed option")]
    UnknownOption { field: String, value: String },
    #[error("field '{field}' is out of range")]
    OutOfRange { field: String },
}

impl StepSchema {
    pub fn validate(&self, payload: &Value) -> Result<(), SchemaViolation> {
        let object = payload.as_object().ok_or(SchemaViolation::NotAnObject)?;

        for key in object.keys() {
            if !self.fields.iter().any(|field| field.name() == key) {
                return Err(SchemaViolation::Unknown(key.clone()));
            }
        }

        for field in self.fields {
            let value = match object.get(field.name()) {
                Some(value) => value,
                None if field.required() => {
                    return Err(SchemaViolation::Missing(field.name().to_string()));
                }
                None => continue,
            };
            check_field(field, value)?;
        }
        Ok(())
    }
}

fn check_field(field: &FieldSpec, value: &Value) -> Result<(), SchemaViolation> {
    match field {
        FieldSpec::Choice { name, options } => {
            let text = value.as_str().ok_or_else(|| SchemaViolation::WrongType {
                field: name.to_string(),
                expected: "string",
            })?;
            if !options.contains(&text) {
                return Err(SchemaViolation::UnknownOption {
                    field: name.to_string(),
                    value: text.to_string(),
                });
            }
        }
        FieldSpec::Score { name } => {
            let score = value.as_u64().ok_or_else(|| SchemaViolation::WrongType {
                field: name.to_string(),
                expected: "integer",
            })?;
            if !(1..=5).contains(&score) {
                return Err(SchemaViolation::OutOfRange {
                    field: name.to_string(),
                });
            }
        }
        FieldSpec::Text { name, required } => {
            let text = value.as_str().ok_or_else(|| SchemaViolation::WrongType {
                field: name.to_string(),
                expected: "string",
            })?;
            if *required && text.trim().is_empty() {
                return Err(SchemaViolation::Missing(name.to_string()));
            }
        }
        FieldSpec::Flag { name } => {
            if !value.is_boolean() {
                return Err(SchemaViolation::WrongType {
                    field: name.to_string(),
                    expected: "boolean",
                });
            }
        }
    }
    Ok(())
}

static VERIFY: StepSchema = StepSchema {
    fields: &[FieldSpec::Choice {
        name: "outcome",
        options: &["confirm", "challenge"],
    }],
};

static EVIDENCE_REQUEST: StepSchema = StepSchema {
    fields: &[FieldSpec::Text {
        name: "note",
        required: false,
    }],
};

static RENEW_PROOF: StepSchema = StepSchema {
    fields: &[
        FieldSpec::Choice {
            name: "outcome",
            options: &["approve", "reject"],
        },
        FieldSpec::Text {
            name: "note",
            required: false,
        },
    ],
};

static SCORED: StepSchema = StepSchema {
    fields: &[
        FieldSpec::Score { name: "score" },
        FieldSpec::Text {
            name: "justification",
            required: true,
        },
    ],
};

static APPROPRIATENESS: StepSchema = StepSchema {
    fields: &[
        FieldSpec::Flag {
            name: "event_is_appropriate",
        },
        FieldSpec::Text {
            name: "justification",
            required: true,
        },
    ],
};

static DECISION: StepSchema = StepSchema {
    fields: &[FieldSpec::Choice {
        name: "outcome",
        options: &["approved", "rejected"],
    }],
};

/// Look up the completion schema for a human step.
pub fn step_schema(step: &str) -> Option<&'static StepSchema> {
    match step {
        "verify-previous-applications"
        | "verify-event-commitment"
        | "verify-business-entity"
        | "verify-state-aid" => Some(&VERIFY),
        "request-event-booking-evidence" => Some(&EVIDENCE_REQUEST),
        "renew-proof-of-event-booking" => Some(&RENEW_PROOF),
        "products-and-services" | "products-and-services-competitors" | "export-strategy" => {
            Some(&SCORED)
        }
        "event-is-appropriate" => Some(&APPROPRIATENESS),
        "decision" => Some(&DECISION),
        _ => None,
    }
}
