/*
[INPUT]:  Injected signing capability
[OUTPUT]: Signed transaction envelopes and signer version info
[POS]:    Signing layer - adapts signing modules to the interceptor
[UPDATE]: When adding signer backends
*/

pub mod mock;
pub mod rpc;
pub mod signer;

pub use mock::MockTransactionSigner;
pub use rpc::RpcTransactionSigner;
pub use signer::{SignedEnvelope, SignerVersion, SigningAdapter, TransactionSigner};
