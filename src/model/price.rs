/// The two samples compared on one poll tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePair {
    pub prior: f64,
    pub current: f64,
}

impl PricePair {
    pub fn new(prior: f64, current: f64) -> Self {
        Self { prior, current }
    }
}
