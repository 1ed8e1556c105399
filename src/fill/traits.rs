use super::{BlockContext, ChainCfg};
use std::sync::Arc;

/// Types that can fill the [`BlockContext`].
pub trait Block: Send + Sync {
    /// Fill the block context.
    ///
    /// ## Note:
    ///
    /// The executor starts every block from a default context, so fields
    /// left untouched by the filler hold their default value, not the value
    /// of the previous block.
    fn fill_block_env(&self, block: &mut BlockContext);

    /// Build a block context from this filler.
    fn block_context(&self) -> BlockContext {
        let mut block = BlockContext::default();
        self.fill_block_env(&mut block);
        block
    }

    /// Get the transaction count hint from the filler. This can be used for
    /// memory pre-allocation during block execution.
    fn tx_count_hint(&self) -> Option<usize> {
        None
    }
}

impl<T> Block for T
where
    T: Fn(&mut BlockContext) + Send + Sync,
{
    fn fill_block_env(&self, block: &mut BlockContext) {
        self(block);
    }
}

impl Block for BlockContext {
    fn fill_block_env(&self, block: &mut BlockContext) {
        *block = self.clone();
    }
}

impl Block for Arc<dyn Block> {
    fn fill_block_env(&self, block: &mut BlockContext) {
        self.as_ref().fill_block_env(block);
    }
}

impl Block for Box<dyn Block> {
    fn fill_block_env(&self, block: &mut BlockContext) {
        self.as_ref().fill_block_env(block);
    }
}

/// Types that can fill the [`ChainCfg`].
pub trait Cfg: Send + Sync {
    /// Fill the chain configuration.
    fn fill_cfg_env(&self, cfg: &mut ChainCfg);
}

impl Cfg for Arc<dyn Cfg> {
    fn fill_cfg_env(&self, cfg: &mut ChainCfg) {
        self.as_ref().fill_cfg_env(cfg);
    }
}

impl Cfg for ChainCfg {
    fn fill_cfg_env(&self, cfg: &mut ChainCfg) {
        *cfg = *self;
    }
}

impl Cfg for Box<dyn Cfg> {
    fn fill_cfg_env(&self, cfg: &mut ChainCfg) {
        self.as_ref().fill_cfg_env(cfg);
    }
}

impl<T> Cfg for T
where
    T: Fn(&mut ChainCfg) + Send + Sync,
{
    fn fill_cfg_env(&self, cfg: &mut ChainCfg) {
        self(cfg);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fill::L1Origin, gas::RefundPolicy};
    use alloy::primitives::Address;

    #[allow(dead_code)]
    fn object_safety(cfg: Box<dyn Cfg>, block: Box<dyn Block>) {
        let mut chain = ChainCfg::default();
        cfg.fill_cfg_env(&mut chain);
        let _ = block.block_context();

        unimplemented!("compilation check only")
    }

    #[test]
    fn closures_fill() {
        let cfg = |cfg: &mut ChainCfg| {
            cfg.chain_id = 42;
            cfg.refund_policy = RefundPolicy::Frontier;
        };
        let mut chain = ChainCfg::default();
        cfg.fill_cfg_env(&mut chain);
        assert_eq!(chain.chain_id, 42);
        assert_eq!(chain.refund_policy.quotient(), 2);
        assert!(!chain.disable_base_fee);

        let block: Arc<dyn Block> = Arc::new(|block: &mut BlockContext| {
            block.number = 7;
            block.beneficiary = Address::repeat_byte(9);
            block.l1_origin = Some(L1Origin { number: 100, ..Default::default() });
        });
        let ctx = block.block_context();
        assert_eq!(ctx.number, 7);
        assert_eq!(ctx.l1_origin.map(|o| o.number), Some(100));
    }
}
