//! Acceptance testing harness
//!
//! Drives a Provider through the same sequence a user would: apply a set of
//! resources, check the resulting attributes, apply a changed set, import,
//! and finally destroy everything. Live tests against a real cloud only run
//! when `CARINA_ACC=1` is set.

use std::collections::HashMap;

use log::{info, warn};

use crate::binding::BindingMap;
use crate::differ::{Diff, diff};
use crate::effect::Effect;
use crate::interpreter::Interpreter;
use crate::provider::{Provider, ProviderError};
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::TypeError;

/// Environment variable that enables live acceptance tests
pub const ACC_ENV: &str = "CARINA_ACC";

/// True if live acceptance tests should run
pub fn enabled() -> bool {
    std::env::var(ACC_ENV).is_ok_and(|v| v == "1")
}

/// Acceptance test failure
#[derive(Debug, thiserror::Error)]
pub enum AccTestError {
    #[error("step {step}: {address} failed validation: {}", format_errors(errors))]
    Validation {
        step: usize,
        address: String,
        errors: Vec<TypeError>,
    },

    #[error("step {step}: unknown resource type '{resource_type}'")]
    UnknownType { step: usize, resource_type: String },

    #[error("step {step}: {address} has unresolved references: {}", references.join(", "))]
    UnresolvedReference {
        step: usize,
        address: String,
        references: Vec<String>,
    },

    #[error("step {step}: {source}")]
    Provider {
        step: usize,
        #[source]
        source: ProviderError,
    },

    #[error("step {step}: check failed for {address}.{path}: {message}")]
    CheckFailed {
        step: usize,
        address: String,
        path: String,
        message: String,
    },

    #[error("step {step}: plan not empty after apply, {address} differs in: {}", attributes.join(", "))]
    PlanNotEmpty {
        step: usize,
        address: String,
        attributes: Vec<String>,
    },

    #[error("step {step}: imported {address} differs in: {}", attributes.join(", "))]
    ImportMismatch {
        step: usize,
        address: String,
        attributes: Vec<String>,
    },

    #[error("{address} still exists after destroy")]
    StillExists { address: String },

    #[error("destroy failed: {0}")]
    Destroy(ProviderError),
}

fn format_errors(errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Assertion on the state after a step
#[derive(Debug, Clone)]
pub enum Check {
    /// Attribute exists and is not an empty string
    AttrSet { address: String, path: String },
    /// Attribute equals the given value
    AttrEq {
        address: String,
        path: String,
        value: Value,
    },
    /// Attribute is absent
    AttrAbsent { address: String, path: String },
}

/// `address` is `type.name` for resources and `data.type.name` for data sources
pub fn attr_set(address: impl Into<String>, path: impl Into<String>) -> Check {
    Check::AttrSet {
        address: address.into(),
        path: path.into(),
    }
}

pub fn attr_eq(address: impl Into<String>, path: impl Into<String>, value: Value) -> Check {
    Check::AttrEq {
        address: address.into(),
        path: path.into(),
        value,
    }
}

pub fn attr_absent(address: impl Into<String>, path: impl Into<String>) -> Check {
    Check::AttrAbsent {
        address: address.into(),
        path: path.into(),
    }
}

/// One step of an acceptance test
#[derive(Debug, Clone)]
pub enum TestStep {
    /// Converge to exactly these resources and data sources, then run checks
    Apply {
        resources: Vec<Resource>,
        checks: Vec<Check>,
    },
    /// Import a managed resource by its identifier and optionally compare it to state
    Import {
        address: String,
        verify: bool,
        ignore: Vec<String>,
    },
}

impl TestStep {
    pub fn apply(resources: Vec<Resource>, checks: Vec<Check>) -> Self {
        TestStep::Apply { resources, checks }
    }

    pub fn import(address: impl Into<String>) -> Self {
        TestStep::Import {
            address: address.into(),
            verify: false,
            ignore: Vec::new(),
        }
    }

    pub fn import_verify(address: impl Into<String>, ignore: &[&str]) -> Self {
        TestStep::Import {
            address: address.into(),
            verify: true,
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A sequence of steps run against one provider
#[derive(Debug, Clone, Default)]
pub struct TestCase {
    pub steps: Vec<TestStep>,
    /// After destroy, read every destroyed resource and require it to be gone
    pub check_destroy: bool,
}

impl TestCase {
    pub fn new(steps: Vec<TestStep>) -> Self {
        Self {
            steps,
            check_destroy: true,
        }
    }

    /// Run all steps, then destroy whatever was created
    pub async fn run<P: Provider>(&self, provider: P) -> Result<(), AccTestError> {
        let mut runner = Runner::new(provider);
        let result = runner.run_steps(&self.steps).await;
        let destroyed = runner.destroy_all().await;

        result?;
        let destroyed = destroyed?;

        if self.check_destroy {
            for state in destroyed {
                let identifier = state.identifier.as_deref().unwrap_or_default();
                let current = runner
                    .interpreter
                    .provider()
                    .read(&state.id, Some(identifier))
                    .await
                    .map_err(AccTestError::Destroy)?;
                if current.exists {
                    return Err(AccTestError::StillExists {
                        address: state.id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

struct Runner<P: Provider> {
    interpreter: Interpreter<P>,
    /// Managed resources in creation order
    managed: Vec<State>,
    data: HashMap<ResourceId, State>,
}

impl<P: Provider> Runner<P> {
    fn new(provider: P) -> Self {
        Self {
            interpreter: Interpreter::new(provider),
            managed: Vec::new(),
            data: HashMap::new(),
        }
    }

    fn provider(&self) -> &P {
        self.interpreter.provider()
    }

    async fn run_steps(&mut self, steps: &[TestStep]) -> Result<(), AccTestError> {
        for (index, step) in steps.iter().enumerate() {
            let step_no = index + 1;
            info!("acceptance step {}", step_no);
            match step {
                TestStep::Apply { resources, checks } => {
                    self.apply_step(step_no, resources).await?;
                    self.verify_empty_plan(step_no, resources).await?;
                    for check in checks {
                        self.run_check(step_no, check)?;
                    }
                }
                TestStep::Import {
                    address,
                    verify,
                    ignore,
                } => self.import_step(step_no, address, *verify, ignore).await?,
            }
        }
        Ok(())
    }

    fn bindings(&self) -> BindingMap {
        let mut bindings = BindingMap::new();
        for state in self.managed.iter().chain(self.data.values()) {
            bindings.insert_state(state);
        }
        bindings
    }

    async fn apply_step(&mut self, step: usize, resources: &[Resource]) -> Result<(), AccTestError> {
        // Resources dropped from the configuration are destroyed first
        let wanted: Vec<&ResourceId> = resources.iter().map(|r| &r.id).collect();
        let dropped: Vec<State> = self
            .managed
            .iter()
            .filter(|s| !wanted.contains(&&s.id))
            .cloned()
            .collect();
        for state in dropped.iter().rev() {
            self.delete_state(step, state).await?;
        }

        for resource in resources {
            let resolved = self.bindings().resolve(resource).map_err(|references| {
                AccTestError::UnresolvedReference {
                    step,
                    address: address_of(resource),
                    references,
                }
            })?;

            let mut resolved = resolved;
            let schema = self
                .provider()
                .schema(&resolved.id.resource_type, resolved.is_data_source())
                .ok_or_else(|| AccTestError::UnknownType {
                    step,
                    resource_type: resolved.id.resource_type.clone(),
                })?;
            schema.apply_defaults(&mut resolved.attributes);
            schema
                .validate(&resolved.attributes)
                .map_err(|errors| AccTestError::Validation {
                    step,
                    address: address_of(&resolved),
                    errors,
                })?;

            if resolved.is_data_source() {
                let state = self.execute(step, &Effect::Read(resolved.clone())).await?;
                self.data.insert(resolved.id.clone(), state);
                continue;
            }

            let current = self
                .managed
                .iter()
                .find(|s| s.id == resolved.id)
                .cloned()
                .unwrap_or_else(|| State::not_found(resolved.id.clone()));

            let Some(effect) = diff(&resolved, &current, Some(&schema)).into_effect() else {
                continue;
            };

            let mut state = self.execute(step, &effect).await?;
            state.carry_forward(&State::existing(
                resolved.id.clone(),
                resolved.attributes.clone(),
            ));
            self.upsert(state);
        }
        Ok(())
    }

    async fn execute(&self, step: usize, effect: &Effect) -> Result<State, AccTestError> {
        let outcome = self
            .interpreter
            .execute_effect(effect)
            .await
            .map_err(|source| AccTestError::Provider { step, source })?;
        outcome
            .state()
            .cloned()
            .ok_or_else(|| AccTestError::Provider {
                step,
                source: ProviderError::new(format!("{} produced no state", effect))
                    .for_resource(effect.resource_id().clone()),
            })
    }

    fn upsert(&mut self, state: State) {
        match self.managed.iter_mut().find(|s| s.id == state.id) {
            Some(existing) => *existing = state,
            None => self.managed.push(state),
        }
    }

    async fn delete_state(&mut self, step: usize, state: &State) -> Result<(), AccTestError> {
        if let Some(identifier) = &state.identifier {
            let effect = Effect::Delete {
                id: state.id.clone(),
                identifier: identifier.clone(),
            };
            self.interpreter
                .execute_effect(&effect)
                .await
                .map_err(|source| AccTestError::Provider { step, source })?;
        }
        self.managed.retain(|s| s.id != state.id);
        Ok(())
    }

    /// Refresh every managed resource and require that nothing would change
    async fn verify_empty_plan(
        &mut self,
        step: usize,
        resources: &[Resource],
    ) -> Result<(), AccTestError> {
        for index in 0..self.managed.len() {
            let prior = self.managed[index].clone();
            let mut refreshed = self
                .provider()
                .read(&prior.id, prior.identifier.as_deref())
                .await
                .map_err(|source| AccTestError::Provider { step, source })?;
            if !refreshed.exists {
                return Err(AccTestError::PlanNotEmpty {
                    step,
                    address: prior.id.to_string(),
                    attributes: vec!["(resource disappeared)".to_string()],
                });
            }
            if let Some(schema) = self.provider().schema(&prior.id.resource_type, false) {
                schema.restore_write_only(&mut refreshed, &prior);
            }
            self.managed[index] = refreshed;
        }

        let bindings = self.bindings();
        for resource in resources.iter().filter(|r| !r.is_data_source()) {
            let Ok(mut resolved) = bindings.resolve(resource) else {
                continue;
            };
            let schema = self
                .provider()
                .schema(&resolved.id.resource_type, false);
            if let Some(schema) = &schema {
                schema.apply_defaults(&mut resolved.attributes);
            }
            let Some(current) = self.managed.iter().find(|s| s.id == resolved.id) else {
                continue;
            };
            match diff(&resolved, current, schema.as_ref()) {
                Diff::NoChange(_) => {}
                Diff::Update {
                    changed_attributes, ..
                }
                | Diff::Replace {
                    changed_attributes, ..
                } => {
                    return Err(AccTestError::PlanNotEmpty {
                        step,
                        address: resolved.id.to_string(),
                        attributes: changed_attributes,
                    });
                }
                Diff::Create(_) => {
                    return Err(AccTestError::PlanNotEmpty {
                        step,
                        address: resolved.id.to_string(),
                        attributes: vec!["(not created)".to_string()],
                    });
                }
            }
        }
        Ok(())
    }

    fn lookup_state(&self, address: &str) -> Option<&State> {
        match address.strip_prefix("data.") {
            Some(rest) => {
                let (resource_type, name) = rest.rsplit_once('.')?;
                self.data.get(&ResourceId::new(resource_type, name))
            }
            None => {
                let (resource_type, name) = address.rsplit_once('.')?;
                self.managed
                    .iter()
                    .find(|s| s.id.resource_type == resource_type && s.id.name == name)
            }
        }
    }

    fn run_check(&self, step: usize, check: &Check) -> Result<(), AccTestError> {
        let (address, path) = match check {
            Check::AttrSet { address, path }
            | Check::AttrEq { address, path, .. }
            | Check::AttrAbsent { address, path } => (address, path),
        };
        let fail = |message: String| AccTestError::CheckFailed {
            step,
            address: address.clone(),
            path: path.clone(),
            message,
        };

        let state = self
            .lookup_state(address)
            .ok_or_else(|| fail("not found in state".to_string()))?;
        let value = if path == "id" {
            state
                .identifier
                .clone()
                .map(Value::String)
                .or_else(|| state.lookup(path))
        } else {
            state.lookup(path)
        };

        match (check, value) {
            (Check::AttrSet { .. }, Some(Value::String(s))) if s.is_empty() => {
                Err(fail("attribute is an empty string".to_string()))
            }
            (Check::AttrSet { .. }, Some(_)) => Ok(()),
            (Check::AttrSet { .. }, None) => Err(fail("attribute not set".to_string())),
            (Check::AttrEq { value: expected, .. }, Some(actual)) if &actual == expected => Ok(()),
            (Check::AttrEq { value: expected, .. }, actual) => Err(fail(format!(
                "expected {:?}, got {:?}",
                expected, actual
            ))),
            (Check::AttrAbsent { .. }, None) => Ok(()),
            (Check::AttrAbsent { .. }, Some(actual)) => {
                Err(fail(format!("expected no value, got {:?}", actual)))
            }
        }
    }

    async fn import_step(
        &self,
        step: usize,
        address: &str,
        verify: bool,
        ignore: &[String],
    ) -> Result<(), AccTestError> {
        let state = self
            .lookup_state(address)
            .ok_or_else(|| AccTestError::CheckFailed {
                step,
                address: address.to_string(),
                path: "id".to_string(),
                message: "not found in state".to_string(),
            })?;
        let identifier = state.identifier.as_deref().unwrap_or_default();
        let imported = self
            .provider()
            .import(&state.id, identifier)
            .await
            .map_err(|source| AccTestError::Provider { step, source })?;

        if imported.identifier != state.identifier {
            return Err(AccTestError::ImportMismatch {
                step,
                address: address.to_string(),
                attributes: vec!["id".to_string()],
            });
        }

        if verify {
            let mut mismatched: Vec<String> = state
                .attributes
                .iter()
                .filter(|(k, _)| !ignore.contains(k))
                .filter(|(k, v)| imported.attributes.get(*k) != Some(*v))
                .map(|(k, _)| k.clone())
                .collect();
            if !mismatched.is_empty() {
                mismatched.sort();
                return Err(AccTestError::ImportMismatch {
                    step,
                    address: address.to_string(),
                    attributes: mismatched,
                });
            }
        }
        Ok(())
    }

    /// Destroy every managed resource in reverse order, returning what was destroyed
    async fn destroy_all(&mut self) -> Result<Vec<State>, AccTestError> {
        let mut destroyed = Vec::new();
        while let Some(state) = self.managed.pop() {
            if let Some(identifier) = &state.identifier
                && let Err(e) = self.provider().delete(&state.id, identifier).await
            {
                warn!("failed to destroy {}: {}", state.id, e);
                return Err(AccTestError::Destroy(e));
            }
            destroyed.push(state);
        }
        Ok(destroyed)
    }
}

fn address_of(resource: &Resource) -> String {
    if resource.is_data_source() {
        format!("data.{}", resource.id)
    } else {
        resource.id.to_string()
    }
}
