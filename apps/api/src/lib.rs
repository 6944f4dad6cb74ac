//! ResumeAI API - resume optimization SaaS backend
//!
//! Axum service over PostgreSQL. Users upload resumes, optimize them
//! against job descriptions with an LLM call, generate cover letters, and
//! track applications. Free accounts get a metered optimization quota;
//! paid access is reconciled from Stripe webhooks.

pub mod applications;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod entitlement;
pub mod errors;
pub mod generation;
pub mod llm_client;
pub mod models;
pub mod resumes;
pub mod routes;
pub mod state;
pub mod store;
