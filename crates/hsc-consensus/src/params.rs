//! Per-chain constants ("network parameters"). Every magic number the engine,
//! store, or mempool consult that varies by deployment (mainnet vs a test
//! network) lives here rather than as a crate-wide constant.

/// Which deployment of the chain a node is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
    Simnet,
}

impl Network {
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams::mainnet(),
            Network::Testnet => NetworkParams::testnet(),
            Network::Regtest => NetworkParams::regtest(),
            Network::Simnet => NetworkParams::simnet(),
        }
    }
}

/// Typed configuration surface read by `hsc-consensus`, `hsc-store`,
/// `hsc-engine`, and `hsc-mempool`. How a node obtains one (CLI flags, a
/// config file, compiled-in defaults) is outside this crate; only the shape
/// and the concrete per-network values are in scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub magic: u32,

    // timing
    pub pow_target_spacing: u64,
    pub pow_target_window: u64,
    pub pow_average_window: u64,
    pub pow_max_actual_timespan_mul: u64,
    pub pow_min_actual_timespan_div: u64,
    pub pow_no_retargeting: bool,
    pub pow_limit: [u8; 32],
    pub max_future_drift: u64,

    // name auctions
    pub name_rollout_interval: u32,
    pub tree_interval: u32,
    pub bidding_period: u32,
    pub reveal_period: u32,
    pub renewal_window: u32,
    pub renewal_maturity: u32,
    pub transfer_lockup: u32,
    pub claim_period: u32,
    pub auction_maturity: u32,

    // coinbase / subsidy
    pub coinbase_maturity: u32,
    pub halving_interval: u32,
    pub initial_reward: u64,

    // caps / DoS
    pub max_block_opens: u32,
    pub max_block_updates: u32,
    pub max_block_renewals: u32,
    pub max_block_sigops: u64,
    pub max_tx_sigops: u64,
    pub max_money: u64,

    // deployment windows
    pub deployment_window: u32,
    pub deployment_threshold: u32,

    // flag-day heights
    pub goosig_stop_height: u32,
    pub hardening_height: u32,

    // mempool
    pub mempool_max_size: u64,
    pub mempool_max_ancestors: u64,
    pub mempool_limit_free_relay: u64,
    pub mempool_max_orphans: u64,
    pub min_relay_fee_rate: u64,

    // orphan blocks
    pub max_orphan_blocks: u64,
    pub tx_start_height: u32,

    /// Hardcoded `(height, block hash)` pairs a candidate chain must match
    /// exactly at that height. Empty means checkpoints are disabled for this
    /// network. Below the highest checkpoint height, the historical fast
    /// path applies (see `hsc_engine::verify::is_historical`).
    pub checkpoints: Vec<(u32, [u8; 32])>,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        NetworkParams {
            network: Network::Mainnet,
            magic: 0x8efa_1fbe,
            pow_target_spacing: 10 * 60,
            pow_target_window: 144,
            pow_average_window: 144,
            pow_max_actual_timespan_mul: 4,
            pow_min_actual_timespan_div: 4,
            pow_no_retargeting: false,
            pow_limit: pow_limit_bits(8),
            max_future_drift: 6 * 60 * 60,
            name_rollout_interval: 7 * 144,
            tree_interval: 36,
            bidding_period: 5 * 144,
            reveal_period: 10 * 144,
            renewal_window: 365 * 144,
            renewal_maturity: 30 * 144,
            transfer_lockup: 2 * 144,
            claim_period: 4 * 7 * 144,
            auction_maturity: (5 + 10) * 144,
            coinbase_maturity: 100,
            halving_interval: 170_000,
            initial_reward: 2000 * 1_000_000,
            max_block_opens: 600,
            max_block_updates: 600,
            max_block_renewals: 600,
            max_block_sigops: 80_000,
            max_tx_sigops: 16_000,
            max_money: 1_360_000_000 * 1_000_000,
            deployment_window: 144,
            deployment_threshold: 108,
            goosig_stop_height: 27_700,
            hardening_height: 91_300,
            mempool_max_size: 100 * 1024 * 1024,
            mempool_max_ancestors: 25,
            mempool_limit_free_relay: 15,
            mempool_max_orphans: 100,
            min_relay_fee_rate: 100,
            max_orphan_blocks: 70,
            tx_start_height: 2016,
            checkpoints: Vec::new(),
        }
    }

    pub fn testnet() -> Self {
        let mut p = Self::mainnet();
        p.network = Network::Testnet;
        p.magic = 0x5be4_a695;
        p.renewal_window = 30 * 144;
        p.claim_period = 4 * 7 * 144;
        p.goosig_stop_height = 0;
        p.hardening_height = 0;
        p
    }

    pub fn regtest() -> Self {
        let mut p = Self::mainnet();
        p.network = Network::Regtest;
        p.magic = 0xeae4_cdef;
        p.pow_no_retargeting = true;
        p.pow_limit = pow_limit_bits(1);
        p.tree_interval = 2;
        p.bidding_period = 2;
        p.reveal_period = 2;
        p.renewal_window = 5000;
        p.renewal_maturity = 50;
        p.transfer_lockup = 2;
        p.coinbase_maturity = 2;
        p.name_rollout_interval = 2;
        p.goosig_stop_height = 0;
        p.hardening_height = 0;
        p.tx_start_height = 0;
        p
    }

    pub fn simnet() -> Self {
        let mut p = Self::regtest();
        p.network = Network::Simnet;
        p.magic = 0x9295_d1f5;
        p
    }

    /// Highest configured checkpoint height, or `0` if checkpoints are
    /// disabled (no checkpoint can legitimately sit at the genesis height).
    pub fn last_checkpoint_height(&self) -> u32 {
        self.checkpoints.iter().map(|(h, _)| *h).max().unwrap_or(0)
    }

    /// The hash a block at `height` must match, if that height carries a
    /// checkpoint.
    pub fn checkpoint_hash(&self, height: u32) -> Option<[u8; 32]> {
        self.checkpoints
            .iter()
            .find(|(h, _)| *h == height)
            .map(|(_, hash)| *hash)
    }
}

/// Builds a pow limit of the form `0x00..00ff..ff` with `zero_bytes` leading
/// zero bytes, matching the "difficulty ceiling" shape used by each network.
const fn pow_limit_bits(zero_bytes: usize) -> [u8; 32] {
    let mut out = [0xffu8; 32];
    let mut i = 0;
    while i < zero_bytes && i < 32 {
        out[i] = 0x00;
        i += 1;
    }
    out
}
