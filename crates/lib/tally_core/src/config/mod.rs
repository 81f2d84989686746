//! Security configuration: settings cache and policy resolution.

pub mod cache;
pub mod policy;

pub use policy::SecurityPolicyProvider;
