//! `runtimeEnvs.*`: one entry point over system, plan and account runtime
//! environments, routed to the matching `sysRuntimeEnvs.*` operation.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{is_truthy, LogicOperation};
use crate::args::CallArgs;
use crate::error::Result;
use crate::router::ResourceRouter;

const TARGET_RESOURCE: &str = "sysRuntimeEnvs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvType {
    Plan,
    System,
    Account,
}

impl RuntimeEnvType {
    pub const ALL: [RuntimeEnvType; 3] = [Self::Plan, Self::System, Self::Account];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "PlanRuntimeEnvironment",
            Self::System => "SystemRuntimeEnvironment",
            Self::Account => "AccountRuntimeEnvironment",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::System => "system",
            Self::Account => "account",
        }
    }

    /// Type implied by an environment name: `system/plan*` is a plan,
    /// any other `system/` name is a system environment.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("system/plan") {
            Self::Plan
        } else if name.starts_with("system/") {
            Self::System
        } else {
            Self::Account
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvAction {
    Get,
    GetAll,
    Update,
    Delete,
    SetDefault,
    Types,
}

impl RuntimeEnvAction {
    pub const ALL: [RuntimeEnvAction; 6] = [
        Self::Get,
        Self::GetAll,
        Self::Update,
        Self::Delete,
        Self::SetDefault,
        Self::Types,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetAll => "getAll",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetDefault => "setDefault",
            Self::Types => "types",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeEnvs {
    action: RuntimeEnvAction,
}

impl RuntimeEnvs {
    pub fn new(action: RuntimeEnvAction) -> Self {
        Self { action }
    }

    /// Generated operation that serves this call, or `None` for `types`.
    fn target(&self, args: &CallArgs) -> Option<&'static str> {
        let is_system = args
            .param("name")
            .and_then(Value::as_str)
            .map(RuntimeEnvType::from_name)
            == Some(RuntimeEnvType::System);
        let for_account = is_truthy(args.param("account"));

        let target = match self.action {
            RuntimeEnvAction::Get if is_system => "getSysRe",
            RuntimeEnvAction::Get => "get",
            RuntimeEnvAction::GetAll if for_account => "getByAccount",
            RuntimeEnvAction::GetAll => "getAll",
            RuntimeEnvAction::Update if is_system => "updateSysRe",
            RuntimeEnvAction::Update => "update",
            RuntimeEnvAction::Delete if is_system => "deleteSysRe",
            RuntimeEnvAction::Delete => "delete",
            RuntimeEnvAction::SetDefault if for_account => "setDefaultForAccount",
            RuntimeEnvAction::SetDefault => "setDefault",
            RuntimeEnvAction::Types => return None,
        };
        Some(target)
    }
}

#[async_trait]
impl LogicOperation for RuntimeEnvs {
    async fn call(&self, router: &ResourceRouter, args: CallArgs) -> Result<Value> {
        let Some(target) = self.target(&args) else {
            let types: serde_json::Map<String, Value> = RuntimeEnvType::ALL
                .iter()
                .map(|t| (t.key().to_string(), json!(t.as_str())))
                .collect();
            return Ok(Value::Object(types));
        };
        let path = format!("{}.{}", TARGET_RESOURCE, target);
        tracing::debug!("runtimeEnvs.{} -> {}", self.action.name(), path);
        router.call(&path, args).await
    }
}
