use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};

use carina_core::binding::{BindingMap, dependencies};
use carina_core::differ::{create_plan, destroy_plan, diff};
use carina_core::effect::Effect;
use carina_core::interpreter::Interpreter;
use carina_core::plan::Plan;
use carina_core::provider::Provider;
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use carina_provider_ibm::resources::{data_source_types, resource_types};
use carina_provider_ibm::{ConfigOverrides, IbmProvider};
use carina_state::{LocalBackend, StateFile, StateLock};

mod display;
mod manifest;

use display::{SchemaIndex, format_effect, format_value, print_plan, print_state};
use manifest::Manifest;

const DEFAULT_MANIFEST: &str = "carina.json";
const PROVIDER_NAME: &str = "ibm";

#[derive(Parser)]
#[command(name = "carina-ibm")]
#[command(about = "Manage IBM Cloud resources declared in a JSON manifest", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest against the provider schemas
    Validate {
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Destroy all managed resources declared in the manifest
    Destroy {
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing remote object under management
    Import {
        /// Resource type (e.g., en_destination_servicenow)
        resource_type: String,
        /// Binding name to record it under
        name: String,
        /// Provider ID (e.g., "{instance_guid}/{destination_id}")
        id: String,

        /// Manifest supplying provider settings
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Read a data source and print its attributes
    Read {
        /// Data source type (e.g., is_lbs)
        data_source: String,

        /// Argument as key=value; values are parsed as JSON when possible
        #[arg(long = "set", value_parser = parse_key_value)]
        set: Vec<(String, serde_json::Value)>,

        /// Manifest supplying provider settings
        #[arg(long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Describe resource and data source schemas
    Schema {
        /// Type to describe; lists all types when omitted
        resource_type: Option<String>,
    },
    /// Remove a lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let backend = LocalBackend::with_path(&cli.state);

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, &backend).await,
        Commands::Apply { file } => run_apply(&file, &backend).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, &backend, auto_approve).await,
        Commands::Import {
            resource_type,
            name,
            id,
            file,
        } => run_import(&file, &backend, ResourceId::new(resource_type, name), &id).await,
        Commands::Read {
            data_source,
            set,
            file,
        } => run_read(&file, &data_source, set).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::ForceUnlock { lock_id } => backend
            .force_unlock(&lock_id)
            .map(|()| println!("{}", format!("Lock {} released.", lock_id).green()))
            .map_err(|e| e.to_string()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn parse_key_value(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn get_schemas() -> SchemaIndex {
    resource_types()
        .into_iter()
        .map(|t| ((t.name().to_string(), false), t.schema()))
        .chain(
            data_source_types()
                .into_iter()
                .map(|t| ((t.name().to_string(), true), t.schema())),
        )
        .collect()
}

fn address(resource: &Resource) -> String {
    if resource.is_data_source() {
        format!("data.{}", resource.id)
    } else {
        resource.id.to_string()
    }
}

/// Apply schema defaults and validate every resource, reporting all errors at once
fn prepare_resources(resources: Vec<Resource>, schemas: &SchemaIndex) -> Result<Vec<Resource>, String> {
    let bindings: HashSet<&str> = resources.iter().map(|r| r.id.name.as_str()).collect();
    let mut all_errors = Vec::new();
    let mut prepared = Vec::with_capacity(resources.len());

    for resource in &resources {
        let key = (resource.id.resource_type.clone(), resource.is_data_source());
        let Some(schema) = schemas.get(&key) else {
            all_errors.push(format!(
                "{}: unknown {} type '{}'",
                address(resource),
                if resource.is_data_source() { "data source" } else { "resource" },
                resource.id.resource_type
            ));
            continue;
        };

        for missing in dependencies(resource)
            .iter()
            .filter(|d| !bindings.contains(d.as_str()))
        {
            all_errors.push(format!(
                "{}: reference to undeclared binding '{}'",
                address(resource),
                missing
            ));
        }

        let mut resource = resource.clone();
        schema.apply_defaults(&mut resource.attributes);
        if let Err(errors) = schema.validate(&resource.attributes) {
            all_errors.extend(errors.iter().map(|e| format!("{}: {}", address(&resource), e)));
        }
        prepared.push(resource);
    }

    if all_errors.is_empty() {
        Ok(prepared)
    } else {
        Err(format!("Validation failed:\n  {}", all_errors.join("\n  ")))
    }
}

fn load_resources(file: &Path, schemas: &SchemaIndex) -> Result<(Manifest, Vec<Resource>), String> {
    let manifest = Manifest::load(file)?;
    let resources = prepare_resources(manifest.resources()?, schemas)?;
    Ok((manifest, resources))
}

/// Environment settings overlaid with the manifest `provider` block
fn get_provider(manifest: Option<&Manifest>) -> Result<IbmProvider, String> {
    let mut overrides = ConfigOverrides::from_env();
    if let Some(manifest) = manifest {
        overrides = overrides.merge(manifest.provider.clone());
    }
    let config = overrides.build().map_err(|e| e.to_string())?;
    println!(
        "{}",
        format!("Using IBM Cloud provider (region: {})", config.region).cyan()
    );
    IbmProvider::new(&config).map_err(|e| e.to_string())
}

/// Manifest for commands where it only supplies provider settings
fn optional_manifest(file: &Path) -> Result<Option<Manifest>, String> {
    if file.exists() {
        Manifest::load(file).map(Some)
    } else {
        debug!("{} not found, using environment only", file.display());
        Ok(None)
    }
}

fn load_state(backend: &LocalBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

fn lock_state(backend: &LocalBackend, operation: &str) -> Result<StateLock, String> {
    backend.lock(operation).map_err(|e| e.to_string())
}

fn save_state(backend: &LocalBackend, state: &mut StateFile) -> Result<(), String> {
    backend.write_state(state).map_err(|e| e.to_string())
}

/// Read every recorded resource again, keeping write-only values from the state file
async fn refresh_states(
    provider: &impl Provider,
    state_file: &StateFile,
) -> Result<Vec<State>, String> {
    let mut refreshed = Vec::new();
    for prior in state_file.states() {
        let mut state = provider
            .read(&prior.id, prior.identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if state.exists {
            if let Some(schema) = provider.schema(&prior.id.resource_type, false) {
                schema.restore_write_only(&mut state, &prior);
            }
        } else {
            warn!("{} was deleted outside of carina", prior.id);
        }
        refreshed.push(state);
    }
    Ok(refreshed)
}

fn effect_for(resource: &Resource, current: &State, schemas: &SchemaIndex) -> Option<Effect> {
    let schema = schemas.get(&(resource.id.resource_type.clone(), false));
    diff(resource, current, schema).into_effect()
}

/// Recorded resources that are no longer declared, in creation order
fn orphaned(current: &[State], resources: &[Resource]) -> Vec<State> {
    let declared: HashSet<&ResourceId> = resources.iter().map(|r| &r.id).collect();
    current
        .iter()
        .filter(|s| s.exists && !declared.contains(&s.id))
        .cloned()
        .collect()
}

/// Build the plan for display; data sources whose inputs are known are read now
async fn create_plan_from_manifest(
    provider: &impl Provider,
    resources: &[Resource],
    current: &[State],
    schemas: &SchemaIndex,
) -> Result<Plan, String> {
    let mut bindings = BindingMap::new();
    for state in current.iter().filter(|s| s.exists) {
        bindings.insert_state(state);
    }

    let mut resolved = Vec::with_capacity(resources.len());
    for resource in resources {
        let resource = bindings.resolve(resource).unwrap_or_else(|_| resource.clone());
        if resource.is_data_source() && dependencies(&resource).is_empty() {
            let state = provider
                .read_data_source(&resource)
                .await
                .map_err(|e| format!("Failed to read {}: {}", address(&resource), e))?;
            bindings.insert_state(&state);
        }
        resolved.push(resource);
    }

    let current_map: HashMap<ResourceId, State> = current
        .iter()
        .filter(|s| s.exists)
        .map(|s| (s.id.clone(), s.clone()))
        .collect();
    let managed_schemas: HashMap<String, ResourceSchema> = schemas
        .iter()
        .filter(|((_, data_source), _)| !data_source)
        .map(|((resource_type, _), schema)| (resource_type.clone(), schema.clone()))
        .collect();

    let mut plan = create_plan(&resolved, &current_map, &managed_schemas);
    for effect in destroy_plan(&orphaned(current, resources)).effects() {
        plan.add(effect.clone());
    }
    Ok(plan)
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());
    let schemas = get_schemas();
    let (_, resources) = load_resources(file, &schemas)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    for resource in &resources {
        println!("  • {}", address(resource));
    }
    Ok(())
}

async fn run_plan(file: &Path, backend: &LocalBackend) -> Result<(), String> {
    let schemas = get_schemas();
    let (manifest, resources) = load_resources(file, &schemas)?;
    let provider = get_provider(Some(&manifest))?;
    let state_file = load_state(backend)?;

    let current = refresh_states(&provider, &state_file).await?;
    let plan = create_plan_from_manifest(&provider, &resources, &current, &schemas).await?;
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(file: &Path, backend: &LocalBackend) -> Result<(), String> {
    let schemas = get_schemas();
    let (manifest, resources) = load_resources(file, &schemas)?;
    let provider = get_provider(Some(&manifest))?;

    let _lock = lock_state(backend, "apply")?;
    let mut state_file = load_state(backend)?;
    let current = refresh_states(&provider, &state_file).await?;
    for state in &current {
        state_file.record(state, PROVIDER_NAME);
    }

    let plan = create_plan_from_manifest(&provider, &resources, &current, &schemas).await?;
    if plan.mutation_count() == 0 {
        save_state(backend, &mut state_file)?;
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan, &schemas);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(provider);
    let mut bindings = BindingMap::new();
    for state in current.iter().filter(|s| s.exists) {
        bindings.insert_state(state);
    }

    let mut success_count = 0;
    let mut failure_count = 0;

    // Effects are recomputed one resource at a time so references see fresh results
    for resource in &resources {
        let resolved = match bindings.resolve(resource) {
            Ok(resolved) => resolved,
            Err(references) => {
                println!(
                    "  {} {} - unresolved references: {}",
                    "✗".red(),
                    address(resource),
                    references.join(", ")
                );
                failure_count += 1;
                continue;
            }
        };

        let effect = if resolved.is_data_source() {
            Effect::Read(resolved.clone())
        } else {
            let current = state_file
                .find_resource(&resolved.id)
                .map(|r| r.to_state())
                .unwrap_or_else(|| State::not_found(resolved.id.clone()));
            match effect_for(&resolved, &current, &schemas) {
                Some(effect) => effect,
                None => continue,
            }
        };

        match interpreter.execute_effect(&effect).await {
            Ok(outcome) => {
                if let Some(state) = outcome.state() {
                    let mut state = state.clone();
                    if !resolved.is_data_source() {
                        state.carry_forward(&State::existing(
                            resolved.id.clone(),
                            resolved.attributes.clone(),
                        ));
                        state_file.record(&state, PROVIDER_NAME);
                        save_state(backend, &mut state_file)?;
                    }
                    bindings.insert_state(&state);
                }
                if effect.is_mutating() {
                    println!("  {} {}", "✓".green(), format_effect(&effect));
                    success_count += 1;
                }
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(&effect), e);
                failure_count += 1;
            }
        }
    }

    for effect in destroy_plan(&orphaned(&current, &resources)).effects() {
        match interpreter.execute_effect(effect).await {
            Ok(_) => {
                state_file.remove_resource(effect.resource_id());
                save_state(backend, &mut state_file)?;
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            success_count, failure_count
        ))
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

async fn run_destroy(file: &Path, backend: &LocalBackend, auto_approve: bool) -> Result<(), String> {
    let manifest = Manifest::load(file)?;
    let declared = manifest.resources()?;

    let _lock = lock_state(backend, "destroy")?;
    let mut state_file = load_state(backend)?;

    let targets: Vec<State> = declared
        .iter()
        .filter(|r| !r.is_data_source())
        .filter_map(|r| state_file.find_resource(&r.id).map(|s| s.to_state()))
        .collect();
    // Dependents first, then what they depend on
    let plan = destroy_plan(&targets);

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    let interpreter = Interpreter::new(get_provider(Some(&manifest))?);
    println!("{}", "Destroying resources...".red().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;

    for effect in plan.effects() {
        match interpreter.execute_effect(effect).await {
            Ok(_) => {
                state_file.remove_resource(effect.resource_id());
                save_state(backend, &mut state_file)?;
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            success_count, failure_count
        ))
    }
}

async fn run_import(
    file: &Path,
    backend: &LocalBackend,
    id: ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let schemas = get_schemas();
    if !schemas.contains_key(&(id.resource_type.clone(), false)) {
        return Err(format!("Unknown resource type '{}'", id.resource_type));
    }
    let manifest = optional_manifest(file)?;
    let provider = get_provider(manifest.as_ref())?;

    let _lock = lock_state(backend, "import")?;
    let mut state_file = load_state(backend)?;
    if state_file.find_resource(&id).is_some() {
        return Err(format!("{} is already managed", id));
    }

    let state = provider
        .import(&id, identifier)
        .await
        .map_err(|e| e.to_string())?;
    state_file.record(&state, PROVIDER_NAME);
    save_state(backend, &mut state_file)?;

    println!("{}", format!("✓ Imported {}", id).green().bold());
    print_state(&state, &schemas, false);
    Ok(())
}

async fn run_read(
    file: &Path,
    data_source: &str,
    arguments: Vec<(String, serde_json::Value)>,
) -> Result<(), String> {
    let schemas = get_schemas();
    let mut resource = Resource::data_source(data_source, "cli");
    for (key, value) in arguments {
        if let Some(value) = Value::from_json_literal(&value) {
            resource.attributes.insert(key, value);
        }
    }
    let resource = prepare_resources(vec![resource], &schemas)?
        .into_iter()
        .next()
        .ok_or_else(|| format!("Unknown data source '{}'", data_source))?;

    let manifest = optional_manifest(file)?;
    let provider = get_provider(manifest.as_ref())?;
    let state = provider
        .read_data_source(&resource)
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state, &schemas, true);
    Ok(())
}

fn describe_type(attr_type: &AttributeType) -> String {
    match attr_type {
        AttributeType::Block(_) => "block".to_string(),
        other => other.to_string(),
    }
}

fn print_attribute_schemas(attributes: &HashMap<String, AttributeSchema>, indent: usize) {
    let mut names: Vec<_> = attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &attributes[name];
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required");
        } else if attr.is_read_only() {
            flags.push("computed");
        } else {
            flags.push("optional");
        }
        if attr.sensitive {
            flags.push("sensitive");
        }
        if attr.force_new {
            flags.push("forces replacement");
        }

        let default = attr
            .default
            .as_ref()
            .map(|v| format!(" = {}", format_value(v)))
            .unwrap_or_default();
        println!(
            "{:indent$}{} ({}, {}){}",
            "",
            name.bold(),
            describe_type(&attr.attr_type),
            flags.join(", "),
            default,
            indent = indent
        );
        if let Some(description) = &attr.description {
            println!("{:indent$}  {}", "", description.dimmed(), indent = indent);
        }
        if let AttributeType::Block(block) = &attr.attr_type {
            print_attribute_schemas(&block.attributes, indent + 4);
        }
    }
}

fn print_schema(schema: &ResourceSchema) {
    let kind = if schema.is_data_source() { "data source" } else { "resource" };
    println!("{} {}", kind.dimmed(), schema.resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }
    println!();
    print_attribute_schemas(&schema.attributes, 2);
    println!();
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let schemas = get_schemas();
    let mut keys: Vec<_> = schemas.keys().collect();
    keys.sort();

    match resource_type {
        Some(wanted) => {
            let matching: Vec<_> = keys.into_iter().filter(|(t, _)| t == wanted).collect();
            if matching.is_empty() {
                return Err(format!("Unknown resource type '{}'", wanted));
            }
            for key in matching {
                print_schema(&schemas[key]);
            }
        }
        None => {
            for (name, data_source) in keys {
                let kind = if *data_source { "data source" } else { "resource" };
                println!("  {} {}", name.cyan(), format!("({})", kind).dimmed());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carina_provider_ibm::IbmConfig;

    #[test]
    fn key_values_parse_json_when_possible() {
        assert_eq!(
            parse_key_value("scan_time_duration=7").unwrap(),
            ("scan_time_duration".to_string(), serde_json::json!(7))
        );
        assert_eq!(
            parse_key_value("report_id=abc-123").unwrap(),
            ("report_id".to_string(), serde_json::json!("abc-123"))
        );
        assert!(parse_key_value("missing").is_err());
    }

    #[test]
    fn every_type_has_a_schema() {
        let schemas = get_schemas();
        assert!(schemas.contains_key(&("en_destination_servicenow".to_string(), false)));
        assert!(schemas.contains_key(&("en_destination_servicenow".to_string(), true)));
        assert!(schemas.contains_key(&("is_lbs".to_string(), true)));
        assert!(!schemas.contains_key(&("is_lbs".to_string(), false)));
    }

    #[test]
    fn validation_reports_every_problem() {
        let schemas = get_schemas();
        let resources = vec![
            Resource::new("en_destination_huawei", "hw")
                .with_attribute("instance_guid", Value::string("inst"))
                .with_attribute("name", Value::string("push"))
                .with_attribute("type", Value::string("servicenow")),
            Resource::new("is_lbs", "lbs"),
            Resource::data_source("en_destination_huawei", "lookup")
                .with_attribute("instance_guid", Value::string("inst"))
                .with_attribute(
                    "destination_id",
                    Value::ResourceRef("nowhere".into(), "destination_id".into()),
                ),
        ];
        let err = prepare_resources(resources, &schemas).unwrap_err();
        assert!(err.contains("en_destination_huawei.hw"), "{}", err);
        assert!(err.contains("unknown resource type 'is_lbs'"), "{}", err);
        assert!(err.contains("undeclared binding 'nowhere'"), "{}", err);
    }

    #[test]
    fn defaults_are_applied_before_planning() {
        let schemas = get_schemas();
        let resource = Resource::new("en_destination_huawei", "hw")
            .with_attribute("instance_guid", Value::string("inst"))
            .with_attribute("name", Value::string("push"))
            .with_attribute("type", Value::string("push_huawei"))
            .with_attribute(
                "config",
                Value::block(
                    [(
                        "params".to_string(),
                        Value::block(
                            [
                                ("client_id".to_string(), Value::string("id")),
                                ("client_secret".to_string(), Value::string("secret")),
                            ]
                            .into_iter()
                            .collect(),
                        ),
                    )]
                    .into_iter()
                    .collect(),
                ),
            );
        let prepared = prepare_resources(vec![resource], &schemas).unwrap();
        let state = State::existing(prepared[0].id.clone(), prepared[0].attributes.clone());
        assert_eq!(
            state.lookup("config.0.params.0.pre_prod"),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn orphans_are_deleted_newest_first() {
        let a = State::existing(ResourceId::new("t", "a"), HashMap::new()).with_identifier("1");
        let b = State::existing(ResourceId::new("t", "b"), HashMap::new()).with_identifier("2");
        let c = State::existing(ResourceId::new("t", "c"), HashMap::new()).with_identifier("3");
        let declared = vec![Resource::new("t", "b")];
        let plan = destroy_plan(&orphaned(&[a, b, c], &declared));
        let names: Vec<&str> = plan
            .effects()
            .iter()
            .map(|e| e.resource_id().name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn plan_creates_declared_and_deletes_orphaned_resources() {
        let provider = IbmProvider::new(&IbmConfig::for_endpoint("key", "http://127.0.0.1:9")).unwrap();
        let schemas = get_schemas();
        let resources = vec![
            Resource::new("en_destination_huawei", "hw")
                .with_attribute("name", Value::string("push")),
            Resource::new("en_destination_servicenow", "now")
                .with_attribute("name", Value::string("tickets")),
        ];
        let kept = State::existing(
            ResourceId::new("en_destination_servicenow", "now"),
            [
                ("name".to_string(), Value::string("tickets")),
                ("destination_id".to_string(), Value::string("d-1")),
            ]
            .into_iter()
            .collect(),
        )
        .with_identifier("inst/d-1");
        let orphan = State::existing(ResourceId::new("en_destination_servicenow", "old"), HashMap::new())
            .with_identifier("inst/d-0");

        let plan = create_plan_from_manifest(&provider, &resources, &[orphan, kept], &schemas)
            .await
            .unwrap();

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(&plan.effects()[0], Effect::Create(r) if r.id.name == "hw"));
        assert!(matches!(
            &plan.effects()[1],
            Effect::Delete { id, identifier } if id.name == "old" && identifier == "inst/d-0"
        ));
    }
}
