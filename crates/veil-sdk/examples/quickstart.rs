//! Quick Start Example
//!
//! Stores a program and a secret, runs a computation over them and waits for
//! the result, all against an in-process network.
//!
//! Run with `RUST_LOG=info cargo run --example quickstart`.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use veil_sdk::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::load()?;

    // A funded wallet on a local ledger
    let ledger = Arc::new(InMemoryLedger::new(&config.chain_id));
    let wallet = LocalWallet::from_seed(&config.user_seed, &config.chain_id);
    ledger.fund(&wallet.account(), 10_000).await;

    let network = LocalNetwork::new(&config.cluster_id, PriceSchedule::default(), ledger.clone());
    let user_key = UserKey::from_seed(&config.user_seed);

    let client = NetworkClient::builder(config)
        .user_key(user_key.clone())
        .backend(Arc::new(network.connect(user_key.user_id())))
        .ledger(Arc::new(WalletGateway::new(wallet.clone(), ledger.clone())))
        .build()?;
    let mut watcher = client.watch(network.subscribe());

    // 1. Store the program
    let parties = ProgramParties::new().input("Party1").output("Party1");
    let payload = vec![0x00, 0x61, 0x73, 0x6d];
    let program = Program::new("addition_simple", payload, client.user_id().clone(), parties);
    let action_id = client.store_program(program).await?;
    let program_id = client.program_id("addition_simple");
    println!("📦 Program stored: {} (action {})", program_id, action_id);

    // 2. Store a secret the program may compute on
    let values: NamedValues = [("my_int1".to_string(), SecretValue::Integer(500))]
        .into_iter()
        .collect();
    let permissions = Permissions::default_for_user(client.user_id().clone())
        .with_compute(client.user_id().clone(), program_id.clone());
    let store_id = client
        .store_values(SecretValueSet::new(values, permissions, 1))
        .await?;
    println!("🔒 Secret stored: {}", store_id);

    // 3. Compute with an inline secret
    let bindings = ProgramBindings::new(program_id)
        .input("Party1", client.party_id().clone())
        .output("Party1", client.party_id().clone());
    let inline: NamedValues = [("my_int2".to_string(), SecretValue::Integer(32))]
        .into_iter()
        .collect();
    let job = ComputeJob::new(bindings, vec![store_id]).with_inline_values(inline);
    let compute_id = client.compute(job).await?;
    println!("🧮 Compute submitted: {}", compute_id);

    // The local network does not evaluate programs; report the sum ourselves.
    let driver = network.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let result: NamedValues = [("my_output".to_string(), SecretValue::Integer(532))]
            .into_iter()
            .collect();
        let outputs = [("Party1".to_string(), result)].into_iter().collect();
        if let Err(e) = driver.finish(compute_id, outputs).await {
            tracing::error!(error = %e, "failed to report compute result");
        }
    });

    // 4. Wait for the outcome
    match client.await_compute(&mut watcher, compute_id).await? {
        ComputeOutcome::Finished { results } => {
            println!("✅ Done! Results: {:?}", results);
        }
        ComputeOutcome::Failed { cause } => {
            println!("❌ Computation failed: {}", cause);
        }
    }

    println!(
        "💰 Balance left: {}",
        ledger.balance(&wallet.account()).await
    );

    Ok(())
}
