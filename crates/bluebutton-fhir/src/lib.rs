//! Blue Button FHIR data access
//!
//! Authenticated, retrying GETs against the Blue Button FHIR API and a walker
//! for multi-page search sets. Tokens come from `bluebutton-auth`; an expired
//! token is refreshed before a request when the configuration allows it, and
//! the token actually used is always handed back so the caller can keep it.

pub mod bundle;
pub mod client;
pub mod error;
pub mod metrics;
pub mod pages;
pub mod request;
pub mod resource;
mod retry;

pub use bundle::{Bundle, BundleLink, NEXT_RELATION};
pub use client::BlueButton;
pub use error::{Error, Result};
pub use pages::{PageSet, collect_pages};
pub use request::{FhirOutcome, FhirResponse, RequestConfig, execute, resolve_url};
pub use resource::FhirResource;
