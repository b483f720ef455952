//! Admission control applied after authentication

mod guard;

pub use guard::{
    ip_allowed, unmap, AdmissionCheck, AdmissionDecision, AdmissionFailure, AdmissionGuard,
    ClientInfo, QuotaSnapshot,
};
