//! Server configuration from environment variables.

use std::net::SocketAddr;

use anyhow::Context;
use livetable_shared::{InsertPolicy, ReducerConfig, RemoveMatch};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub reducer: ReducerConfig,
}

impl ServerConfig {
    /// Parse the server settings from environment variables.
    ///
    /// Environment variables:
    /// - `LIVETABLE_BIND`: listen address (default: "0.0.0.0:8080")
    /// - `LIVETABLE_INSERT_POLICY`: "append" | "upsert" (default: "append")
    /// - `LIVETABLE_REMOVE_MATCH`: "keys" | "project-user" (default: "keys")
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("LIVETABLE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse()
            .with_context(|| format!("invalid LIVETABLE_BIND {bind:?}"))?;

        let mut reducer = ReducerConfig::default();
        if let Some(value) = lookup("LIVETABLE_INSERT_POLICY") {
            reducer.insert = value.parse::<InsertPolicy>()?;
        }
        if let Some(value) = lookup("LIVETABLE_REMOVE_MATCH") {
            reducer.remove = value.parse::<RemoveMatch>()?;
        }

        Ok(Self { bind, reducer })
    }
}
