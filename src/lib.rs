//! # codefresh-sdk
//!
//! Client SDK for the Codefresh platform API.
//!
//! This library provides:
//! - Layered configuration: explicit credentials, environment, or the `.cfconfig` file
//! - Named authentication contexts (API key, JWT, no-auth) persisted as YAML
//! - An OpenAPI-driven client whose operations are addressed by dotted paths
//! - Hand-written operations (`workflows.waitForStatus`, `runtimeEnvs.*`)
//!
//! ## Architecture
//!
//! ```text
//!   ContextStore ──► ConfigResolver ──► Config ──► SpecClient ◄── SpecLoader
//!                                                      ▲
//!                         LogicRegistry ──► ResourceRouter ──► caller
//! ```
//!
//! ## Call Flow
//! 1. Resolve a [`Config`] (provided → env → file)
//! 2. Address an operation: `sdk.node("pipelines.getAll")`
//! 3. On first call the OpenAPI document is loaded (daily disk cache) and bound
//! 4. Arguments are normalized and sent; transient failures are retried
//!
//! ## Modules
//! - `auth`: contexts, the context store and the identity endpoint
//! - `config`: strategy resolution into a [`Config`]
//! - `spec`: OpenAPI loading and operation descriptors
//! - `client`: the OpenAPI-driven operation client
//! - `router`: the dotted-path resource tree
//! - `logic`: hand-written operations
//! - `http`: transport seam, retries and error mapping

pub mod args;
pub mod auth;
pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod http;
pub mod logic;
pub mod router;
pub mod sdk;
pub mod spec;
pub mod util;

pub use args::{resolve_args, CallArgs, ResolvedArgs};
pub use auth::{Context, ContextStore, ContextType};
pub use client::SpecClient;
pub use config::{Config, ConfigOptions, ConfigResolver, Strategy};
pub use error::{ErrorKind, Result, SdkError};
pub use http::{Http, HttpRequest, RequestOptions};
pub use router::{ResourceNode, ResourceRouter};
pub use sdk::Sdk;
