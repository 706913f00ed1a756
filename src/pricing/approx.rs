use std::sync::Arc;

use crate::error::Result;
use crate::instance::{MulticastPackingInstance, Tree};
use crate::pricing::steiner::approximate_steiner_tree;
use crate::pricing::{PricingOracle, Prices};

/// 2-approximate Steiner tree oracle.
/// Prices are only read from the argument, the instance's edge weights are never touched.
pub struct ApproxOracle {
    instance: Arc<MulticastPackingInstance>,
}

impl ApproxOracle {
    pub fn new(instance: Arc<MulticastPackingInstance>) -> Self {
        ApproxOracle { instance }
    }
}

impl PricingOracle for ApproxOracle {
    fn name(&self) -> &str {
        "2-approx steiner"
    }

    fn num_requests(&self) -> usize {
        self.instance.num_requests()
    }

    fn generate_tree(&mut self, request: usize, prices: &Prices) -> Result<Tree> {
        let group = self.instance.request(request).multicast_group();
        approximate_steiner_tree(self.instance.graph(), prices, &group)
    }
}
