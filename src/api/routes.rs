//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::middleware::{cors, invalid_route, method_not_allowed, panic_response, CorsPolicy};
use axum::{
    http::{header, HeaderValue},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer};

/// Routes served in every mode
fn public_routes() -> Router<ApiState> {
    Router::new()
        // Submission
        .route("/tx", post(handlers::submit_tx))
        // Ledger reads
        .route("/block/{hash}", get(handlers::get_block))
        .route("/address/{address}", get(handlers::get_address))
        .route("/tx/{hash}", get(handlers::get_tx))
        // Histories
        .route("/txList/{index}", get(handlers::tx_list))
        .route(
            "/nextTxs/{address}/{tx_hash}/{index}",
            get(handlers::next_txs),
        )
        .route(
            "/nextTxsInBlock/{blockhash}/{tx_hash}/{index}",
            get(handlers::next_txs_in_block),
        )
        .route(
            "/getMinedInfo/{address}/{block_hash}/{index}",
            get(handlers::mined_info),
        )
        .route("/getMarketCap", get(handlers::market_cap))
        // Hardware signer
        .route("/possibilityLedger", get(handlers::possibility_ledger))
        .route(
            "/getLedgerWallet/{start}/{count}",
            get(handlers::ledger_wallet),
        )
        .route(
            "/sendTxWithLedger/{index}/{from}/{to}/{amount}/{fee}",
            get(handlers::send_tx_with_ledger),
        )
}

/// Routes that expose local wallets and node control
fn private_routes() -> Router<ApiState> {
    Router::new()
        // Wallets
        .route(
            "/wallet",
            get(handlers::list_wallets).post(handlers::import_wallet),
        )
        .route("/wallet/{account}", get(handlers::list_wallets_from))
        .route("/wallet/{account}/balance", get(handlers::wallet_balance))
        .route("/wallet/detail/{name}", get(handlers::wallet_detail))
        .route("/wallet/{account}/txs", get(handlers::wallet_txs))
        .route(
            "/wallet/{account}/txs/{nonce}",
            get(handlers::wallet_txs_before),
        )
        .route("/recoverWallet", post(handlers::recover_wallet))
        .route("/generateWallet", post(handlers::generate_wallet))
        .route("/deleteWallet/{name}", get(handlers::delete_wallet))
        .route("/getMnemonic/{lang}", get(handlers::get_mnemonic))
        .route("/hint/{name}", get(handlers::get_hint))
        .route("/dupleName/{name}", get(handlers::duple_name))
        .route("/addWalletFile", post(handlers::add_wallet_file))
        // Address book
        .route("/favorites", get(handlers::favorites))
        .route(
            "/favorites/add/{alias}/{address}",
            get(handlers::add_favorite),
        )
        .route("/favorites/delete/{alias}", get(handlers::delete_favorite))
        // Callbacks
        .route(
            "/wallet/{account}/callback",
            put(handlers::create_callback).get(handlers::list_callbacks),
        )
        .route(
            "/wallet/{account}/callback/{id}",
            delete(handlers::delete_callback),
        )
        // Signing
        .route("/signedtx", post(handlers::signed_tx))
        .route("/transaction", post(handlers::wallet_transaction))
        // Chain
        .route("/block/height/{height}", get(handlers::block_at_height))
        .route("/blockList/{index}", get(handlers::block_list))
        .route("/toptipHeight", get(handlers::top_tip_height))
        // Mining
        .route("/getMiner", get(handlers::get_miner))
        .route("/setMiner/{address}", get(handlers::set_miner))
        .route("/startGPU", get(handlers::start_gpu))
        .route("/setMinerCount/{count}", get(handlers::set_miner_count))
        // Peers
        .route("/peerList", get(handlers::peer_list))
        .route("/peerConnected/{index}", get(handlers::peer_connected))
}

/// Create the API router with all routes
///
/// Private routes are only registered when the mode allows them, so in
/// public mode they are indistinguishable from unknown paths.
pub fn create_router(state: ApiState) -> Router {
    let policy = CorsPolicy::new(&state.config);

    let mut api = public_routes();
    if state.config.mode.serves_private() {
        api = api.merge(private_routes());
    } else {
        log::info!("Public REST mode: private routes are not registered");
    }
    let api = api.method_not_allowed_fallback(method_not_allowed);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(invalid_route)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(policy, cors))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}
