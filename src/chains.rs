//! Chain ids of well known networks.

use alloy::primitives::ChainId;

pub const ETHEREUM_MAINNET: ChainId = 1;
pub const BINANCE_SMART_CHAIN: ChainId = 56;
pub const POLYGON_MAINNET: ChainId = 137;
pub const ARBITRUM_ONE: ChainId = 42161;
