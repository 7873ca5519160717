//! REST API module
//!
//! HTTP surface of the gateway. Everything except `/health` lives under
//! `/api/v1`.
//!
//! # Endpoints
//!
//! ## Public (every mode)
//! - `POST /tx` - Submit a pre-signed transaction
//! - `GET /block/:hash`, `GET /address/:address`, `GET /tx/:hash` - Ledger reads
//! - `GET /txList/:index` - Pending pool page
//! - `GET /nextTxs/:address/:txHash/:index` - Address history page
//! - `GET /nextTxsInBlock/:blockhash/:txHash/:index` - Block transaction page
//! - `GET /getMinedInfo/:address/:blockHash/:index` - Mining reward page
//! - `GET /getMarketCap` - Market data
//! - `GET /possibilityLedger`, `GET /getLedgerWallet/:start/:count` - Hardware signer
//! - `GET /sendTxWithLedger/:index/:from/:to/:amount/:fee` - Hardware-signed submission
//!
//! History routes also accept `?cursor=<token>` in place of the path cursor.
//!
//! ## Private (not registered in public REST mode)
//! - `GET|POST /wallet`, `GET /wallet/:idx` - List / import wallets
//! - `GET /wallet/:account/balance`, `GET /wallet/detail/:name`
//! - `GET /wallet/:account/txs[/:nonce]`
//! - `PUT|GET /wallet/:account/callback`, `DELETE /wallet/:account/callback/:id` - Webhooks
//! - `POST /recoverWallet`, `POST /generateWallet`, `GET /deleteWallet/:name`
//! - `GET /getMnemonic/:lang`, `GET /hint/:name`, `GET /dupleName/:name`
//! - `POST /addWalletFile` - Import from an exported key file
//! - `GET /favorites`, `GET /favorites/add/:alias/:address`, `GET /favorites/delete/:alias`
//! - `POST /signedtx`, `POST /transaction` - Sign locally and submit
//! - `GET /block/height/:height`, `GET /blockList/:index`, `GET /toptipHeight`
//! - `GET /getMiner`, `GET /setMiner/:address`, `GET /startGPU`, `GET /setMinerCount/:count`
//! - `GET /peerList`, `GET /peerConnected/:index`

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::ApiState;
pub use middleware::CorsPolicy;
pub use routes::create_router;
