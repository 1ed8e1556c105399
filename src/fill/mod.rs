mod env;
pub use env::{BlockContext, ChainCfg, L1Origin, TxContext, BLOCK_HASH_HISTORY};

mod traits;
pub use traits::{Block, Cfg};

mod noop;
pub use noop::{NoopBlock, NoopCfg};

/// A [`Cfg`] that disables the base fee, while leaving other cfg options
/// unchanged.
///
/// With the base fee disabled, fee caps below the base fee are accepted and
/// the whole effective gas price is paid to the beneficiary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisableBaseFee;

impl Cfg for DisableBaseFee {
    fn fill_cfg_env(&self, cfg: &mut ChainCfg) {
        cfg.disable_base_fee = true;
    }
}
