/*
[INPUT]:  Outgoing transaction upsert requests
[OUTPUT]: Signed and rewritten transaction requests
[POS]:    Transaction layer - request interception
[UPDATE]: When adding new intercepted endpoints
*/

pub mod interceptor;

pub use interceptor::{TxInterceptor, is_tx_upsert, override_tx_path, parse_tss_id};
