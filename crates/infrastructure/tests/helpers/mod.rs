pub mod mock_net;
pub mod signer;
pub mod wire;
