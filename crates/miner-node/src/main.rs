use std::process::ExitCode;

use miner_node::{logging, Miner, MinerConfig, PayoutScript, RpcClient};
use tracing::{error, info};

fn main() -> ExitCode {
    logging::init();

    let config = MinerConfig::from_env();
    info!(
        network = %config.network,
        rpc_url = %config.rpc_url,
        threads = config.threads,
        range_size = config.nonce_range_size,
        refresh_secs = config.template_refresh.as_secs(),
        "Starting gbt-miner"
    );

    let rpc = match RpcClient::from_config(&config) {
        Ok(rpc) => rpc,
        Err(err) => {
            error!(error = %err, "Could not build RPC client");
            return ExitCode::FAILURE;
        }
    };

    info!(url = %rpc.url(), "RPC client ready");

    let payout = PayoutScript::resolve_or_placeholder(&rpc);

    let mut miner = match Miner::new(rpc, config, payout) {
        Ok(miner) => miner,
        Err(err) => {
            error!(error = %err, "Could not start worker threads");
            return ExitCode::FAILURE;
        }
    };

    miner.run();
    ExitCode::SUCCESS
}
