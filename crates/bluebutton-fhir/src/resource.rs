//! Named FHIR resource paths

use std::fmt;

/// Resource endpoints with a fixed path under `{base}/v{version}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FhirResource {
    Patient,
    Coverage,
    ExplanationOfBenefit,
    /// OpenID Connect userinfo
    Profile,
}

impl FhirResource {
    pub fn path(self) -> &'static str {
        match self {
            FhirResource::Patient => "fhir/Patient/",
            FhirResource::Coverage => "fhir/Coverage/",
            FhirResource::ExplanationOfBenefit => "fhir/ExplanationOfBenefit/",
            FhirResource::Profile => "connect/userinfo",
        }
    }
}

impl fmt::Display for FhirResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
