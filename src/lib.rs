// tierscout: Microsoft Defender for Servers pricing-tier audit
// Exposes the scanner, its Azure collaborators and reporting as a library

pub mod aggregate;
pub mod auth;
pub mod cli;
pub mod core;
pub mod http;
pub mod plan;
pub mod report;
pub mod resource;
pub mod sanitize;
pub mod validation;
