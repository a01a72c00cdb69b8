use std::env;

use anyhow::{anyhow, Context};
use rsnomad::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "rsnomad.json";

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args: Vec<String> = env::args().collect();
    let cmd = args.first().map(String::as_str).unwrap_or("rsnomad");
    if args.len() < 2 {
        print_usage(cmd);
        return Err(anyhow!("No arguments has been provided"));
    }
    let rt = tokio::runtime::Runtime::new()?;
    let mut cloud = create_cloud(rt.handle())?;
    match args[1].as_str() {
        "apply" => cloud
            .apply()
            .context("Could not apply nomad configuration"),
        "destroy" => cloud
            .destroy()
            .context("Could not destroy nomad configuration"),
        "import" => match (args.get(2), args.get(3)) {
            (Some(name), Some(policy)) => cloud
                .import(name, policy)
                .with_context(|| format!("Could not import {} into {}", policy, name)),
            _ => {
                print_usage(cmd);
                Err(anyhow!("import needs a local name and a policy name"))
            }
        },
        other => {
            print_usage(cmd);
            Err(anyhow!("Invalid command: {}", other))
        }
    }
}

fn print_usage(cmd: &str) {
    println!("Usage: {} <command>", cmd);
    println!("Commands:");
    println!("  apply                  Apply the configuration");
    println!("  destroy                Destroy every managed policy");
    println!("  import <name> <policy> Adopt an existing policy as <name>");
    println!();
    println!("The configuration is read from $RSNOMAD_CONFIG (default {}).", DEFAULT_CONFIG_PATH);
}

fn create_cloud(handle: &tokio::runtime::Handle) -> anyhow::Result<Cloud> {
    let path = env::var("RSNOMAD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let configuration = Configuration::from_file(&path)
        .with_context(|| format!("Could not load configuration from {}", path))?;
    let provider_config = configuration.provider.clone().or(NomadConfig::from_env());
    let apis = NomadApis::from_config(&provider_config).context("Could not create nomad client")?;

    let mut cloud = Cloud::default();
    let nomad = cloud
        .nomad_provider(handle, apis)
        .context("Could not register nomad resource types")?;
    configuration
        .declare(&nomad)
        .context("Could not declare configured resources")?;
    Ok(cloud)
}
