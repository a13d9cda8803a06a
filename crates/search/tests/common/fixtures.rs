//! Resources and search parameter definitions used across the tests.

use serde_json::{Value, json};

use helios_search::search::{SearchParameterDefinition, SearchParameterRegistry};
use helios_search::types::{ResourceWrapper, SearchParamType};

/// An Observation fixture.
#[derive(Debug, Clone)]
pub struct ObservationFixture {
    pub id: String,
    pub subject: Option<String>,
    pub performers: Vec<String>,
    pub code: Option<(String, String)>,
}

impl ObservationFixture {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: None,
            performers: Vec::new(),
            code: None,
        }
    }

    pub fn with_subject(mut self, reference: impl Into<String>) -> Self {
        self.subject = Some(reference.into());
        self
    }

    pub fn with_performer(mut self, reference: impl Into<String>) -> Self {
        self.performers.push(reference.into());
        self
    }

    pub fn with_code(mut self, system: &str, code: &str) -> Self {
        self.code = Some((system.to_string(), code.to_string()));
        self
    }

    pub fn to_json(&self) -> Value {
        let mut resource = json!({
            "resourceType": "Observation",
            "id": self.id,
            "status": "final",
        });
        if let Some(subject) = &self.subject {
            resource["subject"] = json!({ "reference": subject });
        }
        if !self.performers.is_empty() {
            resource["performer"] = Value::Array(
                self.performers
                    .iter()
                    .map(|r| json!({ "reference": r }))
                    .collect(),
            );
        }
        if let Some((system, code)) = &self.code {
            resource["code"] = json!({ "coding": [{ "system": system, "code": code }] });
        }
        resource
    }

    pub fn build(&self) -> ResourceWrapper {
        ResourceWrapper::new("Observation", self.id.clone(), self.to_json())
    }
}

pub fn observation(id: &str, subject: &str) -> ResourceWrapper {
    ObservationFixture::new(id).with_subject(subject).build()
}

pub fn patient(id: &str) -> ResourceWrapper {
    ResourceWrapper::new(
        "Patient",
        id,
        json!({ "resourceType": "Patient", "id": id, "name": [{ "family": format!("Family-{}", id) }] }),
    )
}

/// A Patient that links to another Patient.
pub fn linked_patient(id: &str, other: &str) -> ResourceWrapper {
    ResourceWrapper::new(
        "Patient",
        id,
        json!({
            "resourceType": "Patient",
            "id": id,
            "link": [{ "other": { "reference": other }, "type": "seealso" }],
        }),
    )
}

pub fn practitioner(id: &str) -> ResourceWrapper {
    ResourceWrapper::new(
        "Practitioner",
        id,
        json!({ "resourceType": "Practitioner", "id": id }),
    )
}

fn reference(code: &str, base: &str, expression: &str) -> SearchParameterDefinition {
    SearchParameterDefinition::new(
        format!("http://hl7.org/fhir/SearchParameter/{}-{}", base, code),
        code,
        SearchParamType::Reference,
        expression,
    )
    .with_base([base])
}

/// Registry with:
/// - `Observation:subject` and `Observation:patient`, both targeting Patient
/// - `Observation:performer`, targeting Practitioner, Patient and Organization
/// - `Observation:device`, with no declared target
/// - `Patient:link`, targeting Patient
/// - `Observation:code`, a token
pub fn registry() -> SearchParameterRegistry {
    let mut registry = SearchParameterRegistry::new();
    let params = [
        reference("subject", "Observation", "Observation.subject").with_targets(["Patient"]),
        reference("patient", "Observation", "Observation.subject").with_targets(["Patient"]),
        reference("performer", "Observation", "Observation.performer").with_targets([
            "Practitioner",
            "Patient",
            "Organization",
        ]),
        reference("device", "Observation", "Observation.device"),
        reference("link", "Patient", "Patient.link.other").with_targets(["Patient"]),
        SearchParameterDefinition::new(
            "http://hl7.org/fhir/SearchParameter/clinical-code",
            "code",
            SearchParamType::Token,
            "Observation.code",
        )
        .with_base(["Observation"]),
    ];
    for param in params {
        registry
            .register(param)
            .expect("fixture parameters have unique URLs");
    }
    registry
}
